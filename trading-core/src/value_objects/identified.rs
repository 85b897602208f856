/// Identity accessors used by the keyed bounded caches.
///
/// Records without an id are appended as plain entries.
pub trait Identified {
    fn id(&self) -> Option<&str>;

    fn symbol(&self) -> Option<&str> {
        None
    }

    /// Milliseconds since the epoch
    fn timestamp(&self) -> Option<i64> {
        None
    }
}
