//! Frame handle: owns the lifecycle of one embedded frame element.
//!
//! The handle does not interpret what the frame loads. `ready` only means the
//! platform finished navigating; whether the workbook protocol came up is
//! tracked separately by the state mirror.

use url::Url;

use crate::channel::Inbox;
use crate::error::{EmbedError, Result};

/// Platform element hosting the embedded document (an iframe in a browser).
pub trait FrameElement: Send {
    /// Point the element at `source`, starting a navigation.
    fn set_source(&mut self, source: &Url) -> anyhow::Result<()>;

    /// Post a structured message to the element's content window.
    fn post_message(&mut self, message: &serde_json::Value, target_origin: &str)
        -> anyhow::Result<()>;

    /// Install the single low-level message listener, replacing any previous one.
    fn listen(&mut self, inbox: Inbox);
}

/// Page-side factory for frame elements.
pub trait FrameHost: Send {
    fn mount(&mut self, source: &Url) -> anyhow::Result<Box<dyn FrameElement>>;
}

pub struct FrameHandle {
    host: Box<dyn FrameHost>,
    element: Option<Box<dyn FrameElement>>,
    source: Option<Url>,
    ready: bool,
}

impl FrameHandle {
    pub fn new(host: Box<dyn FrameHost>) -> Self {
        Self {
            host,
            element: None,
            source: None,
            ready: false,
        }
    }

    /// Create the element, or re-point the existing one, at `source_url`.
    ///
    /// An invalid URL fails before anything is touched.
    pub fn attach(&mut self, source_url: &str) -> Result<Url> {
        let source = parse_source(source_url)?;

        match self.element.as_mut() {
            Some(element) => element.set_source(&source).map_err(EmbedError::Mount)?,
            None => {
                let element = self.host.mount(&source).map_err(EmbedError::Mount)?;
                self.element = Some(element);
            }
        }

        self.source = Some(source.clone());
        self.ready = false;
        Ok(source)
    }

    /// Re-assign the current source to force a reload.
    pub fn refresh(&mut self) -> Result<()> {
        let (Some(element), Some(source)) = (self.element.as_mut(), self.source.as_ref()) else {
            return Err(EmbedError::ChannelNotReady("frame is not attached"));
        };
        element.set_source(source).map_err(EmbedError::Mount)?;
        self.ready = false;
        Ok(())
    }

    /// Release the element. Safe to call when already detached.
    ///
    /// Returns whether an element was released.
    pub fn detach(&mut self) -> bool {
        self.ready = false;
        self.source = None;
        self.element.take().is_some()
    }

    /// Record that the platform finished navigating the element.
    pub fn mark_loaded(&mut self) {
        if self.element.is_some() {
            self.ready = true;
        }
    }

    pub fn is_attached(&self) -> bool {
        self.element.is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.element.is_some() && self.ready
    }

    pub fn source(&self) -> Option<&Url> {
        self.source.as_ref()
    }

    pub(crate) fn element_mut(&mut self) -> Option<&mut Box<dyn FrameElement>> {
        self.element.as_mut()
    }
}

/// Validate a frame source: an absolute http(s) URL with a real origin.
pub fn parse_source(source_url: &str) -> Result<Url> {
    let invalid = |reason: String| EmbedError::InvalidSource {
        source_url: source_url.to_string(),
        reason,
    };

    let trimmed = source_url.trim();
    if trimmed.is_empty() {
        return Err(invalid("source URL is empty".into()));
    }
    let url = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {other:?}"))),
    }
    if url.host_str().is_none() {
        return Err(invalid("source URL has no host".into()));
    }
    Ok(url)
}

/// ASCII serialization of a URL's origin, e.g. `https://app.example.com`.
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryFrameHost;

    #[test]
    fn test_attach_mounts_once_and_repoints() {
        let host = MemoryFrameHost::new();
        let mut frame = FrameHandle::new(Box::new(host.clone()));

        frame.attach("https://app.example.com/workbook/1").unwrap();
        frame.attach("https://app.example.com/workbook/2").unwrap();

        assert_eq!(host.mounts(), 1);
        assert_eq!(host.navigations().len(), 2);
        assert_eq!(
            frame.source().map(Url::as_str),
            Some("https://app.example.com/workbook/2")
        );
    }

    #[test]
    fn test_invalid_source_leaves_previous_frame_untouched() {
        let host = MemoryFrameHost::new();
        let mut frame = FrameHandle::new(Box::new(host.clone()));
        frame.attach("https://app.example.com/workbook/1").unwrap();
        frame.mark_loaded();

        for bad in ["", "   ", "not a url", "file:///etc/passwd", "javascript:alert(1)"] {
            let err = frame.attach(bad).unwrap_err();
            assert!(matches!(err, EmbedError::InvalidSource { .. }), "{bad:?}");
        }

        assert!(frame.is_ready());
        assert_eq!(host.navigations().len(), 1);
        assert_eq!(
            frame.source().map(Url::as_str),
            Some("https://app.example.com/workbook/1")
        );
    }

    #[test]
    fn test_ready_requires_navigation() {
        let mut frame = FrameHandle::new(Box::new(MemoryFrameHost::new()));
        frame.mark_loaded();
        assert!(!frame.is_ready());

        frame.attach("https://app.example.com/wb").unwrap();
        assert!(frame.is_attached());
        assert!(!frame.is_ready());

        frame.mark_loaded();
        assert!(frame.is_ready());

        frame.refresh().unwrap();
        assert!(!frame.is_ready());
    }

    #[test]
    fn test_detach_is_idempotent() {
        let host = MemoryFrameHost::new();
        let mut frame = FrameHandle::new(Box::new(host.clone()));
        frame.attach("https://app.example.com/wb").unwrap();

        assert!(frame.detach());
        assert!(!frame.detach());
        assert!(!frame.is_attached());
        assert!(!host.is_mounted());
        assert!(matches!(
            frame.refresh(),
            Err(EmbedError::ChannelNotReady(_))
        ));
    }

    #[test]
    fn test_origin_of() {
        let url = parse_source("https://app.example.com:8443/a/b?c=d").unwrap();
        assert_eq!(origin_of(&url), "https://app.example.com:8443");
        let url = parse_source("https://app.example.com/a").unwrap();
        assert_eq!(origin_of(&url), "https://app.example.com");
    }
}
