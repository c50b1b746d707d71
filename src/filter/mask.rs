use arrow::array::BooleanArray;
use arrow_buffer::{BooleanBuffer, NullBuffer, bit_iterator::BitIndexIterator, bit_util};

/// A row inclusion bitmap over a batch of `len` rows.
///
/// Bit `i` is set when row `i` passes the filter. The number of set bits is
/// computed once at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterMask {
    bits: Vec<u8>,
    len: usize,
    included: usize,
}

impl FilterMask {
    /// A mask with every row excluded
    pub fn new_unset(len: usize) -> Self {
        Self {
            bits: vec![0; bit_util::ceil(len, 8)],
            len,
            included: 0,
        }
    }

    /// A mask with every row included
    pub fn new_set(len: usize) -> Self {
        Self::from_fn(len, |_| true)
    }

    /// Build a mask by evaluating `f` for every row
    pub fn from_fn(len: usize, mut f: impl FnMut(usize) -> bool) -> Self {
        let mut bits = vec![0; bit_util::ceil(len, 8)];
        let mut included = 0;
        for i in 0..len {
            if f(i) {
                bit_util::set_bit(&mut bits, i);
                included += 1;
            }
        }
        Self {
            bits,
            len,
            included,
        }
    }

    /// Include exactly the valid rows of an array
    pub(crate) fn from_validity(len: usize, nulls: Option<&NullBuffer>) -> Self {
        match nulls {
            Some(nulls) => Self::from_fn(len, |i| nulls.is_valid(i)),
            None => Self::new_set(len),
        }
    }

    pub(crate) fn from_boolean_buffer(buffer: &BooleanBuffer) -> Self {
        Self::from_fn(buffer.len(), |i| buffer.value(i))
    }

    /// Number of rows covered
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of rows included
    pub fn included_count(&self) -> usize {
        self.included
    }

    /// The packed bitmap, `ceil(len / 8)` bytes, least significant bit first
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn is_included(&self, row: usize) -> bool {
        row < self.len && bit_util::get_bit(&self.bits, row)
    }

    /// Indices of included rows in ascending order
    pub fn included_indices(&self) -> impl Iterator<Item = usize> + '_ {
        BitIndexIterator::new(&self.bits, 0, self.len)
    }

    /// Row-wise AND of two masks over the same rows
    pub fn and(&self, other: &FilterMask) -> FilterMask {
        self.combine(other, |a, b| a & b)
    }

    /// Row-wise OR of two masks over the same rows
    pub fn or(&self, other: &FilterMask) -> FilterMask {
        self.combine(other, |a, b| a | b)
    }

    fn combine(&self, other: &FilterMask, op: impl Fn(u8, u8) -> u8) -> FilterMask {
        debug_assert_eq!(self.len, other.len, "combined masks must cover the same rows");
        let len = self.len.min(other.len);
        let mut bits: Vec<u8> = self
            .bits
            .iter()
            .zip(&other.bits)
            .map(|(a, b)| op(*a, *b))
            .collect();
        let trailing = len % 8;
        if trailing != 0 {
            if let Some(last) = bits.last_mut() {
                *last &= (1u8 << trailing) - 1;
            }
        }
        let included = bits.iter().map(|byte| byte.count_ones() as usize).sum();
        FilterMask {
            bits,
            len,
            included,
        }
    }

    /// View the mask as a non-null boolean array
    pub fn to_boolean_array(&self) -> BooleanArray {
        BooleanArray::from_iter((0..self.len).map(|i| Some(self.is_included(i))))
    }
}
