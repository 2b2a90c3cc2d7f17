//! Intrusive doubly linked recency list.
//!
//! The list owns every node it allocates. Callers hold raw node pointers as
//! positions (the store's index map does exactly that) and hand them back for
//! O(1) promotion. Head and tail are value-less sentinels, so relinking never
//! has to special-case an empty list or the list ends.

use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr;

/// A node of the recency list.
///
/// Sentinel nodes leave `val` uninitialized; every node returned by
/// [`RecencyList::push_front`] carries an initialized value.
pub(crate) struct Node<T> {
    val: MaybeUninit<T>,
    prev: *mut Node<T>,
    next: *mut Node<T>,
}

impl<T> Node<T> {
    fn new(val: T) -> Self {
        Node {
            val: MaybeUninit::new(val),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    fn sentinel() -> Self {
        Node {
            val: MaybeUninit::uninit(),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    /// # Safety
    ///
    /// Must only be called on a value node, never on a sentinel.
    pub(crate) unsafe fn value(&self) -> &T {
        // SAFETY: caller guarantees this is a value node.
        unsafe { self.val.assume_init_ref() }
    }

    /// # Safety
    ///
    /// Must only be called on a value node, never on a sentinel.
    pub(crate) unsafe fn value_mut(&mut self) -> &mut T {
        // SAFETY: caller guarantees this is a value node.
        unsafe { self.val.assume_init_mut() }
    }
}

/// Doubly linked list ordered from most to least recently used.
///
/// The list itself imposes no capacity; the owning store decides when to
/// call [`pop_back`](RecencyList::pop_back).
pub(crate) struct RecencyList<T> {
    len: usize,
    head: *mut Node<T>,
    tail: *mut Node<T>,
}

impl<T> RecencyList<T> {
    /// Creates an empty list with its two sentinels.
    pub(crate) fn new() -> Self {
        let head = Box::into_raw(Box::new(Node::sentinel()));
        let tail = Box::into_raw(Box::new(Node::sentinel()));

        // SAFETY: both sentinels were just allocated and nothing else points at them.
        unsafe {
            (*head).next = tail;
            (*tail).prev = head;
        }

        RecencyList { len: 0, head, tail }
    }

    /// Number of value nodes in the list.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the list holds no values.
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts `val` as the most recently used element and returns its position.
    ///
    /// The returned pointer stays valid until the node is popped or the list
    /// is cleared or dropped.
    pub(crate) fn push_front(&mut self, val: T) -> *mut Node<T> {
        let node = Box::into_raw(Box::new(Node::new(val)));
        // SAFETY: node is freshly allocated and not linked into any list.
        unsafe { self.link_front(node) };
        self.len += 1;
        node
    }

    /// Moves `node` to the most recently used position.
    ///
    /// # Safety
    ///
    /// `node` must be a value node currently linked into this list.
    pub(crate) unsafe fn move_to_front(&mut self, node: *mut Node<T>) {
        // SAFETY: head is a live sentinel and the caller guarantees node is linked here.
        unsafe {
            if (*self.head).next == node {
                return;
            }
            self.unlink(node);
            self.link_front(node);
        }
    }

    /// Removes the least recently used element, if any.
    pub(crate) fn pop_back(&mut self) -> Option<T> {
        // SAFETY: tail is a live sentinel; its predecessor is head or a value node.
        let last = unsafe { (*self.tail).prev };
        if last == self.head {
            return None;
        }

        // SAFETY: last is a linked value node owned by this list. After unlinking
        // nothing else references it, so reclaiming the box is sound.
        unsafe {
            self.unlink(last);
            self.len -= 1;
            let node = *Box::from_raw(last);
            Some(node.val.assume_init())
        }
    }

    /// Iterates from the most recently used element to the least recently used.
    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            // SAFETY: head is a live sentinel for the lifetime of the list.
            next: unsafe { (*self.head).next },
            end: self.tail,
            _marker: PhantomData,
        }
    }

    /// Drops every value, keeping the sentinels.
    pub(crate) fn clear(&mut self) {
        while self.pop_back().is_some() {}
    }

    /// # Safety
    ///
    /// `node` must be linked into this list and must not be a sentinel.
    unsafe fn unlink(&mut self, node: *mut Node<T>) {
        // SAFETY: a linked node always has live neighbours (value nodes or sentinels).
        unsafe {
            (*(*node).prev).next = (*node).next;
            (*(*node).next).prev = (*node).prev;
        }
    }

    /// # Safety
    ///
    /// `node` must be a live node that is not currently linked into this list.
    unsafe fn link_front(&mut self, node: *mut Node<T>) {
        // SAFETY: head and its successor are live; node is detached.
        unsafe {
            (*node).prev = self.head;
            (*node).next = (*self.head).next;
            (*(*self.head).next).prev = node;
            (*self.head).next = node;
        }
    }
}

impl<T> Drop for RecencyList<T> {
    fn drop(&mut self) {
        self.clear();
        // SAFETY: the sentinels were allocated in `new` and are freed exactly once here.
        // Their values were never initialized, and MaybeUninit never drops its contents.
        unsafe {
            drop(Box::from_raw(self.head));
            drop(Box::from_raw(self.tail));
        }
    }
}

impl<T> core::fmt::Debug for RecencyList<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RecencyList").field("len", &self.len).finish()
    }
}

/// Borrowing iterator over a [`RecencyList`], most recent first.
pub(crate) struct Iter<'a, T> {
    next: *mut Node<T>,
    end: *mut Node<T>,
    _marker: PhantomData<&'a T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.next == self.end {
            return None;
        }
        // SAFETY: the iterator borrows the list, so every node between the
        // sentinels stays alive and linked while it is in use.
        unsafe {
            let node = &*self.next;
            self.next = node.next;
            Some(node.value())
        }
    }
}
