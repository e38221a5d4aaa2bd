//! Pooled storage for element and attribute records.
//!
//! Records are carved out of fixed-capacity blocks. A block is never
//! reallocated once created, and records are never freed individually:
//! the whole pool goes away together with the `Document`.

use log::trace;

use crate::scanner::Span;
use crate::Error;

/// The default amount of records in one pool block.
pub const DEFAULT_BLOCK_CAPACITY: usize = 100;


/// Element ID.
///
/// Index into the element pool.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct ElementId(pub usize);

/// Attribute ID.
///
/// Index into the attribute pool.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct AttributeId(pub usize);


#[derive(Debug)]
pub(crate) struct ElementData {
    pub name: Span,
    pub text: Option<Span>,
    pub text_is_cdata: bool,
    pub first_attribute: Option<AttributeId>,
    pub last_attribute: Option<AttributeId>,
    pub parent: Option<ElementId>,
    pub first_child: Option<ElementId>,
    pub current_child: Option<ElementId>,
    pub next_sibling: Option<ElementId>,
    pub prev_sibling: Option<ElementId>,
    pub pos: usize,
}

impl ElementData {
    fn new(name: Span, pos: usize) -> Self {
        ElementData {
            name,
            text: None,
            text_is_cdata: false,
            first_attribute: None,
            last_attribute: None,
            parent: None,
            first_child: None,
            current_child: None,
            next_sibling: None,
            prev_sibling: None,
            pos,
        }
    }
}


#[derive(Debug)]
pub(crate) struct AttributeData {
    pub name: Span,
    pub value: Span,
    pub next: Option<AttributeId>,
    pub pos: usize,
}


/// A chain of fixed-capacity blocks.
///
/// Adjacent blocks are neighbours in `blocks`, so the chain needs no
/// explicit `next`/`previous` links.
pub(crate) struct Pool<T> {
    blocks: Vec<Vec<T>>,
    capacity: usize,
    limit: Option<usize>,
    len: usize,
}

impl<T> Pool<T> {
    pub fn new(capacity: usize, limit: Option<usize>) -> Self {
        Pool {
            blocks: Vec::new(),
            capacity: capacity.max(1),
            limit,
            len: 0,
        }
    }

    /// Stores a record in the next free slot and returns its index.
    ///
    /// A new block is appended when the current one is full.
    pub fn alloc(&mut self, record: T) -> Result<usize, Error> {
        let is_full = self.blocks.last().map_or(true, |b| b.len() == self.capacity);
        if is_full {
            if let Some(limit) = self.limit {
                if self.blocks.len() >= limit {
                    return Err(Error::AllocationFailure { limit });
                }
            }

            self.blocks.push(Vec::with_capacity(self.capacity));
            trace!("pool grown to {} block(s) of {} records", self.blocks.len(), self.capacity);
        }

        let idx = self.len;
        let block_idx = self.blocks.len() - 1;
        self.blocks[block_idx].push(record);
        self.len += 1;

        Ok(idx)
    }

    #[inline]
    pub fn get(&self, idx: usize) -> &T {
        &self.blocks[idx / self.capacity][idx % self.capacity]
    }

    #[inline]
    pub fn get_mut(&mut self, idx: usize) -> &mut T {
        &mut self.blocks[idx / self.capacity][idx % self.capacity]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}


/// Element and attribute pools plus the linking logic.
pub(crate) struct Arena {
    elements: Pool<ElementData>,
    attributes: Pool<AttributeData>,
}

impl Arena {
    pub fn new(block_capacity: usize, block_limit: Option<usize>) -> Self {
        Arena {
            elements: Pool::new(block_capacity, block_limit),
            attributes: Pool::new(block_capacity, block_limit),
        }
    }

    pub fn alloc_element(&mut self, name: Span, pos: usize) -> Result<ElementId, Error> {
        self.elements.alloc(ElementData::new(name, pos)).map(ElementId)
    }

    pub fn alloc_attribute(
        &mut self,
        name: Span,
        value: Span,
        pos: usize,
    ) -> Result<AttributeId, Error> {
        let attr = AttributeData { name, value, next: None, pos };
        self.attributes.alloc(attr).map(AttributeId)
    }

    /// Appends `child` to the `parent` children list.
    pub fn attach_child(&mut self, parent_id: ElementId, child_id: ElementId) {
        let last_child_id = self.element(parent_id).current_child;

        {
            let child = self.element_mut(child_id);
            child.parent = Some(parent_id);
            child.prev_sibling = last_child_id;
        }

        match last_child_id {
            Some(id) => self.element_mut(id).next_sibling = Some(child_id),
            None => self.element_mut(parent_id).first_child = Some(child_id),
        }

        self.element_mut(parent_id).current_child = Some(child_id);
    }

    /// Appends `attr_id` to the end of the element's attributes list.
    pub fn attach_attribute(&mut self, element_id: ElementId, attr_id: AttributeId) {
        match self.element(element_id).last_attribute {
            Some(id) => self.attribute_mut(id).next = Some(attr_id),
            None => self.element_mut(element_id).first_attribute = Some(attr_id),
        }

        self.element_mut(element_id).last_attribute = Some(attr_id);
    }

    #[inline]
    pub fn element(&self, id: ElementId) -> &ElementData {
        self.elements.get(id.0)
    }

    #[inline]
    pub fn element_mut(&mut self, id: ElementId) -> &mut ElementData {
        self.elements.get_mut(id.0)
    }

    #[inline]
    pub fn attribute(&self, id: AttributeId) -> &AttributeData {
        self.attributes.get(id.0)
    }

    #[inline]
    fn attribute_mut(&mut self, id: AttributeId) -> &mut AttributeData {
        self.attributes.get_mut(id.0)
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn element_blocks(&self) -> usize {
        self.elements.block_count()
    }

    pub fn attribute_blocks(&self) -> usize {
        self.attributes.block_count()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize) -> Span {
        Span::new(start, 1)
    }

    #[test]
    fn pool_grows_by_blocks() {
        let mut pool = Pool::new(3, None);
        for i in 0..7 {
            assert_eq!(pool.alloc(i * 10).unwrap(), i);
        }

        assert_eq!(pool.len(), 7);
        assert_eq!(pool.block_count(), 3);
        assert_eq!(*pool.get(0), 0);
        assert_eq!(*pool.get(3), 30);
        assert_eq!(*pool.get(6), 60);
    }

    #[test]
    fn pool_is_lazy() {
        let pool: Pool<u8> = Pool::new(10, None);
        assert_eq!(pool.block_count(), 0);
    }

    #[test]
    fn pool_zero_capacity_is_clamped() {
        let mut pool = Pool::new(0, None);
        pool.alloc(1).unwrap();
        pool.alloc(2).unwrap();
        assert_eq!(pool.block_count(), 2);
        assert_eq!(*pool.get(1), 2);
    }

    #[test]
    fn pool_limit() {
        let mut pool = Pool::new(2, Some(2));
        for i in 0..4 {
            pool.alloc(i).unwrap();
        }

        match pool.alloc(4) {
            Err(Error::AllocationFailure { limit }) => assert_eq!(limit, 2),
            _ => panic!("the pool must be exhausted"),
        }

        // A failed allocation must not change anything.
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.block_count(), 2);
    }

    #[test]
    fn attach_children() {
        let mut arena = Arena::new(2, None);
        let root = arena.alloc_element(span(0), 0).unwrap();
        let a = arena.alloc_element(span(1), 1).unwrap();
        let b = arena.alloc_element(span(2), 2).unwrap();
        let c = arena.alloc_element(span(3), 3).unwrap();
        arena.attach_child(root, a);
        arena.attach_child(root, b);
        arena.attach_child(root, c);

        let r = arena.element(root);
        assert_eq!(r.parent, None);
        assert_eq!(r.first_child, Some(a));
        assert_eq!(r.current_child, Some(c));

        assert_eq!(arena.element(a).prev_sibling, None);
        assert_eq!(arena.element(a).next_sibling, Some(b));
        assert_eq!(arena.element(b).prev_sibling, Some(a));
        assert_eq!(arena.element(b).next_sibling, Some(c));
        assert_eq!(arena.element(c).prev_sibling, Some(b));
        assert_eq!(arena.element(c).next_sibling, None);

        for id in &[a, b, c] {
            assert_eq!(arena.element(*id).parent, Some(root));
        }

        assert_eq!(arena.element_blocks(), 2);
    }

    #[test]
    fn attach_attributes_in_order() {
        let mut arena = Arena::new(100, None);
        let e = arena.alloc_element(span(0), 0).unwrap();
        let ids: Vec<_> = (0..3)
            .map(|i| arena.alloc_attribute(span(i), span(i + 10), i).unwrap())
            .collect();

        for id in &ids {
            arena.attach_attribute(e, *id);
        }

        assert_eq!(arena.element(e).first_attribute, Some(ids[0]));
        assert_eq!(arena.element(e).last_attribute, Some(ids[2]));
        assert_eq!(arena.attribute(ids[0]).next, Some(ids[1]));
        assert_eq!(arena.attribute(ids[1]).next, Some(ids[2]));
        assert_eq!(arena.attribute(ids[2]).next, None);
        assert_eq!(arena.attribute_count(), 3);
    }
}
