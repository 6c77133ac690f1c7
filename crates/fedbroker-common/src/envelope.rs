use bytes::Bytes;

/// A message together with its accumulated routing address frames.
///
/// An envelope is an ordered sequence of opaque binary frames. The leading
/// frames are routing addresses pushed on by identity-routing sockets as the
/// message travels; the trailing frame carries the payload. Address
/// manipulation is value-style: `push_address` and `pop_address` consume the
/// envelope and return a new one, so a half-routed message can never be
/// observed through a stale handle.
///
/// # Example
///
/// ```
/// use fedbroker_common::Envelope;
///
/// let request = Envelope::from_body("job-42");
/// let wrapped = request.push_address("worker-1");
///
/// let (address, payload) = wrapped.pop_address().unwrap();
/// assert_eq!(&address[..], b"worker-1");
/// assert_eq!(payload.body().unwrap().as_ref(), b"job-42");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    frames: Vec<Bytes>,
}

impl Envelope {
    /// Creates an empty envelope.
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Creates an envelope from an ordered frame sequence.
    pub fn from_frames(frames: Vec<Bytes>) -> Self {
        Self { frames }
    }

    /// Creates a single-frame envelope carrying only a payload.
    pub fn from_body(body: impl Into<Bytes>) -> Self {
        Self {
            frames: vec![body.into()],
        }
    }

    /// Prepends a routing address frame, consuming the envelope.
    pub fn push_address(mut self, address: impl Into<Bytes>) -> Self {
        self.frames.insert(0, address.into());
        self
    }

    /// Removes and returns the leading address frame plus the remaining
    /// envelope, or `None` if the envelope is empty.
    pub fn pop_address(mut self) -> Option<(Bytes, Envelope)> {
        if self.frames.is_empty() {
            return None;
        }
        let address = self.frames.remove(0);
        Some((address, self))
    }

    /// The leading frame, if any.
    pub fn first(&self) -> Option<&Bytes> {
        self.frames.first()
    }

    /// The trailing frame, conventionally the payload.
    pub fn body(&self) -> Option<&Bytes> {
        self.frames.last()
    }

    /// All frames in order.
    pub fn frames(&self) -> &[Bytes] {
        &self.frames
    }

    /// Number of frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// True if the envelope holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Consumes the envelope, yielding its frames.
    pub fn into_frames(self) -> Vec<Bytes> {
        self.frames
    }
}
