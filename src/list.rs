extern crate alloc;

use alloc::boxed::Box;
use alloc::fmt;
use core::mem;
use core::ptr;

/// One link of a node's LRU queue, carrying a cache entry between its two
/// neighbours.
///
/// Links are handed out as raw pointers so the owning node's key map can
/// unlink or re-order an entry in O(1), with no search. The endpoints of
/// every queue are payload-free sentinels, which is why `val` is a
/// `MaybeUninit`.
pub(crate) struct ListEntry<T> {
    /// The payload. Uninitialized in the two sentinel links.
    val: mem::MaybeUninit<T>,
    /// Neighbour on the more-recently-used side.
    prev: *mut ListEntry<T>,
    /// Neighbour on the less-recently-used side.
    next: *mut ListEntry<T>,
}

impl<T> ListEntry<T> {
    /// Allocates an unlinked link carrying `val`.
    fn new(val: T) -> Self {
        ListEntry {
            val: mem::MaybeUninit::new(val),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    /// Allocates a payload-free link for use as a queue endpoint.
    fn sentinel() -> Self {
        ListEntry {
            val: mem::MaybeUninit::uninit(),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    /// Borrows the payload.
    ///
    /// # Safety
    ///
    /// The link must carry a payload; calling this on a sentinel reads
    /// uninitialized memory.
    pub(crate) unsafe fn get_value(&self) -> &T {
        // SAFETY: the caller promises this link is not a sentinel
        unsafe { self.val.assume_init_ref() }
    }

    /// Mutably borrows the payload.
    ///
    /// # Safety
    ///
    /// The link must carry a payload; calling this on a sentinel reads
    /// uninitialized memory.
    pub(crate) unsafe fn get_value_mut(&mut self) -> &mut T {
        // SAFETY: the caller promises this link is not a sentinel
        unsafe { self.val.assume_init_mut() }
    }

    /// Consumes an unlinked link and returns its payload.
    ///
    /// # Safety
    ///
    /// The link must carry a payload and must already be detached from
    /// its queue.
    pub(crate) unsafe fn into_value(self) -> T {
        // SAFETY: the caller promises this link is not a sentinel
        unsafe { self.val.assume_init() }
    }
}

/// The LRU queue of a quadtree node.
///
/// A doubly linked chain of [`ListEntry`] links bracketed by two
/// sentinels: the front holds the most recently used entry, the back the
/// least recently used. Appends, removals through a held pointer, and
/// move-to-front are all O(1), which is what lets a node's every entry
/// operation stay constant time.
///
/// The queue is unbounded. The cache never evicts on insert, only when
/// its caller explicitly asks for eviction, so there is no capacity to
/// enforce here.
pub(crate) struct List<T> {
    /// Current number of payload-carrying links.
    len: usize,
    /// Sentinel on the most-recently-used end.
    head: *mut ListEntry<T>,
    /// Sentinel on the least-recently-used end.
    tail: *mut ListEntry<T>,
}

impl<T> List<T> {
    /// Creates an empty queue: two sentinels linked to each other.
    pub(crate) fn new() -> List<T> {
        let head = Box::into_raw(Box::new(ListEntry::sentinel()));
        let tail = Box::into_raw(Box::new(ListEntry::sentinel()));

        // SAFETY: both sentinels were just allocated above
        unsafe {
            (*head).next = tail;
            (*tail).prev = head;
        }

        List { len: 0, head, tail }
    }

    /// Number of entries in the queue.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the queue holds no entries.
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Unlinks a link from its neighbours without freeing it. The link's
    /// own pointers are left stale; reattach or rebox it.
    ///
    /// # Safety
    ///
    /// `node` must be a payload-carrying link of this queue.
    unsafe fn detach(&mut self, node: *mut ListEntry<T>) {
        // SAFETY: every linked entry sits between the sentinels, so both
        // neighbours exist
        unsafe {
            let prev = (*node).prev;
            let next = (*node).next;
            (*prev).next = next;
            (*next).prev = prev;
        }
    }

    /// Links a detached link in at the most-recently-used position.
    ///
    /// # Safety
    ///
    /// `node` must be a valid link that is not currently in any queue.
    unsafe fn attach(&mut self, node: *mut ListEntry<T>) {
        // SAFETY: the head sentinel is valid for the queue's lifetime and
        // the caller promises node is unlinked
        unsafe {
            let first = (*self.head).next;
            (*node).prev = self.head;
            (*node).next = first;
            (*first).prev = node;
            (*self.head).next = node;
        }
    }

    /// Adds a value at the most-recently-used position.
    ///
    /// Returns a pointer to the new link, stable until the entry is
    /// removed from the queue.
    pub(crate) fn add(&mut self, v: T) -> *mut ListEntry<T> {
        let node = Box::into_raw(Box::new(ListEntry::new(v)));
        // SAFETY: node was just allocated and belongs to no queue yet
        unsafe { self.attach(node) };
        self.len += 1;
        node
    }

    /// Unlinks the least recently used entry and hands its link back,
    /// or `None` if the queue is empty.
    pub(crate) fn remove_last(&mut self) -> Option<Box<ListEntry<T>>> {
        // SAFETY: the sentinels are valid for the queue's lifetime, and a
        // last link distinct from head always carries a payload
        unsafe {
            let last = (*self.tail).prev;
            if last == self.head {
                return None;
            }
            self.detach(last);
            self.len -= 1;
            Some(Box::from_raw(last))
        }
    }

    /// Unlinks a specific entry and hands its link back. The null and
    /// sentinel guards make a stale pointer from the caller's map a
    /// `None` rather than undefined behaviour, but only for those cases.
    ///
    /// # Safety
    ///
    /// A non-null, non-sentinel `node` must be a link of this queue.
    pub(crate) unsafe fn remove(&mut self, node: *mut ListEntry<T>) -> Option<Box<ListEntry<T>>> {
        if node.is_null() || node == self.head || node == self.tail {
            return None;
        }

        // SAFETY: the caller promises node is linked here, so it can be
        // unlinked and reboxed
        unsafe {
            self.detach(node);
            self.len -= 1;
            Some(Box::from_raw(node))
        }
    }

    /// Re-links an entry at the most-recently-used position.
    ///
    /// # Safety
    ///
    /// A non-null, non-sentinel `node` must be a link of this queue.
    pub(crate) unsafe fn move_to_front(&mut self, node: *mut ListEntry<T>) {
        if node.is_null() || node == self.head || node == self.tail {
            return;
        }

        // SAFETY: the head sentinel is valid for the queue's lifetime and
        // the caller promises node is linked here
        unsafe {
            // Nothing to do when the entry is already the freshest
            if (*self.head).next != node {
                self.detach(node);
                self.attach(node);
            }
        }
    }

    /// Peeks at the least recently used value.
    pub(crate) fn back(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: the queue is non-empty, so the link before the tail
        // sentinel carries a payload
        unsafe {
            let last = (*self.tail).prev;
            Some((*last).get_value())
        }
    }

    /// Clears the queue, removing and dropping all values.
    pub(crate) fn clear(&mut self) {
        while let Some(entry) = self.remove_last() {
            // SAFETY: remove_last only ever returns payload-carrying links
            drop(unsafe { entry.into_value() });
        }
    }
}

impl<T> Drop for List<T> {
    /// Drops all remaining values, then frees the sentinels.
    fn drop(&mut self) {
        self.clear();

        // SAFETY: the sentinels were allocated in `new` and are freed
        // exactly once, here
        unsafe {
            let _ = Box::from_raw(self.head);
            let _ = Box::from_raw(self.tail);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List").field("length", &self.len).finish()
    }
}
