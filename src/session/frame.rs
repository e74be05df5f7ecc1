//! Server-Sent Events frames
//!
//! Each frame is one complete SSE event, terminated by a blank line, so it
//! can be written and flushed on its own.

use bytes::Bytes;

use crate::registry::Message;

const KEEPALIVE: &[u8] = b"event: ping\ndata: ping\n\n";

/// One unit of pushed stream content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A broadcast message, rendered as a list item fragment
    Delivery(Message),
    /// Idle-connection heartbeat
    Keepalive,
}

impl Frame {
    /// SSE event type of this frame
    pub fn event(&self) -> &'static str {
        match self {
            Frame::Delivery(_) => "message",
            Frame::Keepalive => "ping",
        }
    }

    /// Encode the frame for the wire
    ///
    /// Message text is written verbatim; escaping is left to the caller.
    pub fn encode(&self) -> Bytes {
        match self {
            Frame::Delivery(msg) => Bytes::from(format!(
                "event: message\ndata: <li><b>{}</b>{}</li>\n\n",
                msg.from(),
                msg.content()
            )),
            Frame::Keepalive => Bytes::from_static(KEEPALIVE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_frame() {
        let frame = Frame::Delivery(Message::new("bob", "hi"));

        assert_eq!(frame.event(), "message");
        assert_eq!(
            frame.encode(),
            Bytes::from_static(b"event: message\ndata: <li><b>bob</b>hi</li>\n\n")
        );
    }

    #[test]
    fn test_keepalive_frame() {
        assert_eq!(Frame::Keepalive.event(), "ping");
        assert_eq!(
            Frame::Keepalive.encode(),
            Bytes::from_static(b"event: ping\ndata: ping\n\n")
        );
    }

    #[test]
    fn test_delivery_is_not_escaped() {
        let frame = Frame::Delivery(Message::new("<i>eve</i>", "a & b"));

        assert_eq!(
            frame.encode(),
            Bytes::from_static(b"event: message\ndata: <li><b><i>eve</i></b>a & b</li>\n\n")
        );
    }
}
