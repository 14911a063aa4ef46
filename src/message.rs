//! In-memory application view of a frame (spec.md §3, "Message").

/// The body of an outbound message: either a complete slice known up
/// front, or a sentinel marking a multipart send whose bytes will arrive
/// across one or more `multipart_payload` calls.
///
/// This is the Rust-idiomatic rendering of "a null body pointer to mark
/// intent" (spec.md §4.4, §9 "Multipart send") — an `enum` instead of a
/// null-pointer convention.
pub enum Body<'a> {
    Bytes(&'a [u8]),
    Multipart { total_len: u32 },
}

impl Body<'_> {
    pub(crate) fn len(&self) -> u32 {
        match self {
            Body::Bytes(b) => b.len() as u32,
            Body::Multipart { total_len } => *total_len,
        }
    }
}

/// An outbound message, passed to `send`/`query`/`respond` and their
/// multipart variants.
pub struct OutMessage<'a> {
    /// Ignored unless `is_response` is set, in which case it is the ID of
    /// the request being answered (spec.md §3, "ID allocation").
    pub frame_id: u32,
    pub is_response: bool,
    pub msg_type: u32,
    pub body: Body<'a>,
}

impl<'a> OutMessage<'a> {
    pub fn new(msg_type: u32, payload: &'a [u8]) -> Self {
        OutMessage { frame_id: 0, is_response: false, msg_type, body: Body::Bytes(payload) }
    }

    pub fn response_to(frame_id: u32, msg_type: u32, payload: &'a [u8]) -> Self {
        OutMessage { frame_id, is_response: true, msg_type, body: Body::Bytes(payload) }
    }

    pub fn multipart(msg_type: u32, total_len: u32) -> Self {
        OutMessage { frame_id: 0, is_response: false, msg_type, body: Body::Multipart { total_len } }
    }
}

/// A received, validated frame, as delivered to a listener callback.
///
/// `is_response` deliberately does not appear here: the engine never marks
/// inbound frames as responses (spec.md §9, Open Questions) — correlating
/// a reply with its request is the job of the ID listener that `query`
/// registers, not a flag on the delivered message.
pub struct Message<'a> {
    pub frame_id: u32,
    pub msg_type: u32,
    /// `None` only for the synchronous cleanup delivery an ID listener
    /// gets when it is removed while still holding non-zero user-data
    /// (spec.md §4.5, "cleanup delivery") — distinguishable from a real
    /// `LEN = 0` frame, which is `Some(&[])`.
    pub payload: Option<&'a [u8]>,
    /// Carried in from the matching ID listener before the callback runs,
    /// and copied back out afterwards, so the callback can replace them
    /// in place (spec.md §9, "Callback user-data"). Zeroed for type and
    /// generic listener dispatch, which do not carry per-slot user data.
    pub user_data_1: u32,
    pub user_data_2: u32,
}

impl Message<'_> {
    /// True for the synchronous cleanup delivery fired when an ID
    /// listener holding user-data is removed, rather than for a genuine
    /// received frame.
    pub fn is_cleanup(&self) -> bool {
        self.payload.is_none()
    }
}

/// Directive a listener callback returns to the dispatcher (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Not handled; keep searching lower-priority listeners/tiers.
    Next,
    /// Handled; keep the listener live as-is.
    Stay,
    /// Handled; reset the ID listener's timeout countdown. Equivalent to
    /// `Stay` for type/generic listeners, which have no timeout.
    Renew,
    /// Handled; remove the listener.
    Close,
}
