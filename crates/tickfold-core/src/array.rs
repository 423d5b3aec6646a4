//! Two-dimensional numeric arrays over interchangeable backing stores
//!
//! A [`NumericArray`] is `count` items of `properties` doubles each, stored
//! contiguously item-major. The four backing stores differ only in how the
//! buffer is acquired and released; every one of them satisfies the same
//! indexed read/write contract. Releasing a backing store always goes
//! through the [`Reclaimer`](crate::Reclaimer) rather than freeing on the
//! dropping thread.
//!
//! [`ArrayView`] is the non-owning counterpart: a borrowed slice of some
//! parent's storage plus a shape. Slicing and zero-copy reshaping produce
//! views; cloning a view materializes an owned array.

use std::any::Any;
use std::mem::size_of;
use std::ptr::NonNull;
use std::slice;

use crate::error::ArrayError;
use crate::reclaim::{RawMem, Reclaim, Reclaimer};
use crate::record::DoubleRecord;
use crate::reduce;

/// Owning two-dimensional `f64` array.
pub struct NumericArray {
    count: usize,
    properties: usize,
    storage: Storage,
}

enum Storage {
    /// Manually allocated zeroed block; freed by the reclaimer.
    Owned(OwnedBuf),
    /// Adopted caller buffer; dropped on the reclaimer thread.
    External(ExternalBuf),
    /// Single inline value; release is a no-op.
    Scalar(f64),
    /// Adopted fixed-layout record buffer viewed as flat doubles.
    Records(RecordBuf),
    /// Backing store already released via `dispose`.
    Disposed,
}

struct OwnedBuf {
    ptr: NonNull<f64>,
    len: usize,
}

impl OwnedBuf {
    fn alloc_zeroed(len: usize) -> Self {
        if len == 0 {
            return Self {
                ptr: NonNull::dangling(),
                len: 0,
            };
        }
        let layout = std::alloc::Layout::array::<f64>(len).expect("buffer layout");
        let raw = unsafe { std::alloc::alloc_zeroed(layout) } as *mut f64;
        let Some(ptr) = NonNull::new(raw) else {
            std::alloc::handle_alloc_error(layout);
        };
        Self { ptr, len }
    }

    fn from_slice(data: &[f64]) -> Self {
        let mut buf = Self::alloc_zeroed(data.len());
        buf.as_mut_slice().copy_from_slice(data);
        buf
    }

    fn as_slice(&self) -> &[f64] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [f64] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for OwnedBuf {
    fn drop(&mut self) {
        if self.len > 0 {
            Reclaimer::global().enqueue(Reclaim::RawMem(RawMem::new(self.ptr, self.len)));
        }
    }
}

// SAFETY: the block is uniquely owned by this handle; shared reads through
// &self are backed by the single-writer contract.
unsafe impl Send for OwnedBuf {}
unsafe impl Sync for OwnedBuf {}

/// Keeps a caller's `Vec<f64>` alive without copying. `None` only during drop.
struct ExternalBuf {
    vec: Option<Vec<f64>>,
}

impl ExternalBuf {
    fn adopt(vec: Vec<f64>) -> Self {
        Self { vec: Some(vec) }
    }

    fn as_slice(&self) -> &[f64] {
        // `vec` is Some until drop.
        self.vec.as_deref().unwrap_or(&[])
    }

    fn as_mut_slice(&mut self) -> &mut [f64] {
        self.vec.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for ExternalBuf {
    fn drop(&mut self) {
        if let Some(vec) = self.vec.take() {
            Reclaimer::global().enqueue(Reclaim::Buffer(Box::new(vec)));
        }
    }
}

/// Keeps a caller's `Vec<R>` of fixed-layout records alive, exposing it as a
/// flat `f64` buffer. The raw view stays valid because the keeper box never
/// moves the `Vec`'s heap storage.
struct RecordBuf {
    keeper: Option<Box<dyn Any + Send>>,
    ptr: NonNull<f64>,
    len: usize,
}

impl RecordBuf {
    fn adopt<R: DoubleRecord + Send>(records: Vec<R>) -> Self {
        let len = records.len() * R::DOUBLES;
        let ptr = NonNull::new(records.as_ptr() as *mut f64).expect("non-empty Vec pointer");
        Self {
            keeper: Some(Box::new(records)),
            ptr,
            len,
        }
    }

    fn as_slice(&self) -> &[f64] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [f64] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for RecordBuf {
    fn drop(&mut self) {
        if let Some(keeper) = self.keeper.take() {
            Reclaimer::global().enqueue(Reclaim::Buffer(keeper));
        }
    }
}

// SAFETY: the record storage is uniquely owned via the keeper box; the raw
// view is only handed out under &self / &mut self borrows.
unsafe impl Send for RecordBuf {}
unsafe impl Sync for RecordBuf {}

impl Storage {
    fn as_slice(&self) -> &[f64] {
        match self {
            Storage::Owned(buf) => buf.as_slice(),
            Storage::External(buf) => buf.as_slice(),
            Storage::Scalar(value) => slice::from_ref(value),
            Storage::Records(buf) => buf.as_slice(),
            Storage::Disposed => &[],
        }
    }

    fn as_mut_slice(&mut self) -> &mut [f64] {
        match self {
            Storage::Owned(buf) => buf.as_mut_slice(),
            Storage::External(buf) => buf.as_mut_slice(),
            Storage::Scalar(value) => slice::from_mut(value),
            Storage::Records(buf) => buf.as_mut_slice(),
            Storage::Disposed => &mut [],
        }
    }

    fn variant(&self) -> &'static str {
        match self {
            Storage::Owned(_) => "owned",
            Storage::External(_) => "external",
            Storage::Scalar(_) => "scalar",
            Storage::Records(_) => "records",
            Storage::Disposed => "disposed",
        }
    }
}

impl NumericArray {
    /// Allocate a zero-filled `count x properties` array.
    pub fn allocate(count: usize, properties: usize) -> Result<Self, ArrayError> {
        check_shape(count, properties)?;
        Ok(Self {
            count,
            properties,
            storage: Storage::Owned(OwnedBuf::alloc_zeroed(count * properties)),
        })
    }

    /// Copy a flat item-major buffer into an owned array of the given width.
    pub fn from_slice(data: &[f64], properties: usize) -> Result<Self, ArrayError> {
        if data.is_empty() || properties == 0 {
            return Err(ArrayError::EmptyShape {
                count: data.len(),
                properties,
            });
        }
        if data.len() % properties != 0 {
            // A flat slice is a 1 x len array being given a new shape.
            return Err(ArrayError::ShapeMismatch {
                count: 1,
                properties: data.len(),
                new_count: data.len() / properties,
                new_properties: properties,
            });
        }
        Ok(Self {
            count: data.len() / properties,
            properties,
            storage: Storage::Owned(OwnedBuf::from_slice(data)),
        })
    }

    /// Wrap (or copy, with `copy = true`) a caller-provided buffer.
    ///
    /// Without copying, the `Vec` itself is what keeps the storage alive; it
    /// is dropped on the reclaimer thread when the array is released.
    pub fn from_external(buf: Vec<f64>, copy: bool, properties: usize) -> Result<Self, ArrayError> {
        if copy {
            return Self::from_slice(&buf, properties);
        }
        if buf.is_empty() || properties == 0 {
            return Err(ArrayError::EmptyShape {
                count: buf.len(),
                properties,
            });
        }
        if buf.len() % properties != 0 {
            return Err(ArrayError::ShapeMismatch {
                count: 1,
                properties: buf.len(),
                new_count: buf.len() / properties,
                new_properties: properties,
            });
        }
        Ok(Self {
            count: buf.len() / properties,
            properties,
            storage: Storage::External(ExternalBuf::adopt(buf)),
        })
    }

    /// Wrap a single value as a `1 x 1` scalar array. Release is a no-op.
    pub fn from_scalar(value: f64) -> Self {
        Self {
            count: 1,
            properties: 1,
            storage: Storage::Scalar(value),
        }
    }

    /// Wrap (or copy, with `copy = true`) a buffer of fixed-layout records as
    /// a `records.len() x R::DOUBLES` array.
    pub fn from_records<R: DoubleRecord + Send>(
        records: Vec<R>,
        copy: bool,
    ) -> Result<Self, ArrayError> {
        if records.is_empty() || R::DOUBLES == 0 {
            return Err(ArrayError::EmptyShape {
                count: records.len(),
                properties: R::DOUBLES,
            });
        }
        let count = records.len();
        if copy {
            let mut flat = Vec::with_capacity(count * R::DOUBLES);
            for record in &records {
                flat.extend_from_slice(record.as_doubles());
            }
            return Self::from_slice(&flat, R::DOUBLES);
        }
        Ok(Self {
            count,
            properties: R::DOUBLES,
            storage: Storage::Records(RecordBuf::adopt(records)),
        })
    }

    /// Number of items.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Doubles per item.
    pub fn properties(&self) -> usize {
        self.properties
    }

    /// Total element count (`count * properties`).
    pub fn len(&self) -> usize {
        self.count * self.properties
    }

    /// True after `dispose` released the backing store.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A scalar array is exactly one item.
    pub fn is_scalar(&self) -> bool {
        self.count == 1
    }

    /// The flat item-major buffer.
    pub fn as_slice(&self) -> &[f64] {
        self.storage.as_slice()
    }

    /// Mutable flat buffer.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.storage.as_mut_slice()
    }

    /// Read one element. Bounds-checked in every build.
    pub fn get(&self, item: usize, prop: usize) -> f64 {
        assert!(
            item < self.count && prop < self.properties,
            "index ({item}, {prop}) out of bounds for {}x{} array",
            self.count,
            self.properties
        );
        self.as_slice()[item * self.properties + prop]
    }

    /// Write one element. Bounds-checked in every build.
    pub fn set(&mut self, item: usize, prop: usize, value: f64) {
        assert!(
            item < self.count && prop < self.properties,
            "index ({item}, {prop}) out of bounds for {}x{} array",
            self.count,
            self.properties
        );
        let offset = item * self.properties + prop;
        self.as_mut_slice()[offset] = value;
    }

    /// Read one element without bounds checks.
    ///
    /// # Safety
    ///
    /// `item < count` and `prop < properties` must hold; checked only by
    /// `debug_assert!`.
    pub unsafe fn get_unchecked(&self, item: usize, prop: usize) -> f64 {
        debug_assert!(item < self.count && prop < self.properties);
        unsafe { *self.as_slice().get_unchecked(item * self.properties + prop) }
    }

    /// Write one element without bounds checks.
    ///
    /// # Safety
    ///
    /// Same contract as [`Self::get_unchecked`].
    pub unsafe fn set_unchecked(&mut self, item: usize, prop: usize, value: f64) {
        debug_assert!(item < self.count && prop < self.properties);
        let offset = item * self.properties + prop;
        unsafe { *self.as_mut_slice().get_unchecked_mut(offset) = value };
    }

    /// Whole-array view.
    pub fn view(&self) -> ArrayView<'_> {
        ArrayView {
            data: self.as_slice(),
            count: self.count,
            properties: self.properties,
        }
    }

    /// Reinterpret the same storage under a new shape, without copying.
    pub fn reshape(
        &self,
        new_count: usize,
        new_properties: usize,
    ) -> Result<ArrayView<'_>, ArrayError> {
        self.view().reshape(new_count, new_properties)
    }

    /// Independent copy under a new shape.
    pub fn reshape_copy(
        &self,
        new_count: usize,
        new_properties: usize,
    ) -> Result<NumericArray, ArrayError> {
        Ok(self.reshape(new_count, new_properties)?.to_array())
    }

    /// Non-owning view over items `[start, stop)`.
    pub fn slice(&self, start: usize, stop: usize) -> Result<ArrayView<'_>, ArrayError> {
        self.view().slice(start, stop)
    }

    /// Single-item view.
    pub fn slice_index(&self, item: usize) -> Result<ArrayView<'_>, ArrayError> {
        self.slice(item, item + 1)
    }

    /// Single-item owned copy. A one-property item comes back scalar-backed,
    /// avoiding an allocation; the contract is identical either way.
    pub fn slice_index_copy(&self, item: usize) -> Result<NumericArray, ArrayError> {
        let view = self.slice_index(item)?;
        if self.properties == 1 {
            return Ok(NumericArray::from_scalar(view.get(0, 0)));
        }
        Ok(view.to_array())
    }

    /// Overwrite every element.
    pub fn fill(&mut self, value: f64) {
        self.as_mut_slice().fill(value);
    }

    /// Overwrite one property column.
    pub fn fill_property(&mut self, prop: usize, value: f64) {
        assert!(
            prop < self.properties,
            "property {prop} out of bounds for {} properties",
            self.properties
        );
        let properties = self.properties;
        for item in 0..self.count {
            self.as_mut_slice()[item * properties + prop] = value;
        }
    }

    /// Sum of every element.
    pub fn sum(&self) -> f64 {
        reduce::sum(self.as_slice())
    }

    /// Mean of every element.
    pub fn mean(&self) -> f64 {
        reduce::mean(self.as_slice())
    }

    /// Median of every element.
    pub fn median(&self) -> f64 {
        reduce::median(self.as_slice())
    }

    /// Sum of one property column.
    pub fn sum_property(&self, prop: usize) -> f64 {
        self.view().sum_property(prop)
    }

    /// Mean of one property column.
    pub fn mean_property(&self, prop: usize) -> f64 {
        self.view().mean_property(prop)
    }

    /// Median of one property column.
    pub fn median_property(&self, prop: usize) -> f64 {
        self.view().median_property(prop)
    }

    /// Elementwise map into a fresh owned array.
    pub fn select<F: Fn(f64) -> f64>(&self, f: F) -> NumericArray {
        let mut buf = OwnedBuf::alloc_zeroed(self.len());
        for (out, value) in buf.as_mut_slice().iter_mut().zip(self.as_slice()) {
            *out = f(*value);
        }
        NumericArray {
            count: self.count,
            properties: self.properties,
            storage: Storage::Owned(buf),
        }
    }

    /// Elementwise map in place.
    pub fn select_in_place<F: Fn(f64) -> f64>(&mut self, f: F) {
        for value in self.as_mut_slice() {
            *value = f(*value);
        }
    }

    /// View the buffer as a slice of fixed-layout records.
    ///
    /// Fails unless the buffer is a whole number of records.
    pub fn reinterpret<R: DoubleRecord>(&self) -> Result<&[R], ArrayError> {
        let total_bytes = self.len() * size_of::<f64>();
        if size_of::<R>() == 0 || total_bytes % size_of::<R>() != 0 {
            return Err(ArrayError::RecordSizeMismatch {
                total_bytes,
                record_size: size_of::<R>(),
            });
        }
        // SAFETY: R is all-f64 with alignment 8, same as the buffer; the byte
        // length divides exactly.
        Ok(unsafe {
            slice::from_raw_parts(
                self.as_slice().as_ptr().cast(),
                total_bytes / size_of::<R>(),
            )
        })
    }

    /// Build one record per item, copying `properties_per_item` doubles
    /// (default: the record's own width) and zero-filling the rest.
    pub fn cast<R: DoubleRecord>(&self, properties_per_item: Option<usize>) -> Vec<R> {
        let take = properties_per_item
            .unwrap_or(R::DOUBLES)
            .min(self.properties)
            .min(R::DOUBLES);
        let data = self.as_slice();
        (0..self.count)
            .map(|item| {
                let start = item * self.properties;
                R::from_doubles(&data[start..start + take])
            })
            .collect()
    }

    /// Release the backing store ahead of drop by routing it to the
    /// reclaimer. Idempotent: a second call (and the eventual drop) is a
    /// no-op. Reads after disposal are a contract violation; the checked
    /// accessors will assert.
    pub fn dispose(&mut self) {
        // Dropping the old storage enqueues the resource exactly once.
        self.storage = Storage::Disposed;
        self.count = 0;
    }

    /// Whether `dispose` has released the backing store.
    pub fn is_disposed(&self) -> bool {
        matches!(self.storage, Storage::Disposed)
    }
}

impl Clone for NumericArray {
    /// Always an independent, owned deep copy with identical shape and
    /// contents.
    fn clone(&self) -> Self {
        Self {
            count: self.count,
            properties: self.properties,
            storage: Storage::Owned(OwnedBuf::from_slice(self.as_slice())),
        }
    }
}

/// Identity semantics: equal iff the two handles share a storage address and
/// shape. Independently allocated arrays with identical contents are unequal.
impl PartialEq for NumericArray {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.as_slice().as_ptr(), other.as_slice().as_ptr())
            && self.count == other.count
            && self.properties == other.properties
    }
}

impl std::fmt::Debug for NumericArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NumericArray")
            .field("count", &self.count)
            .field("properties", &self.properties)
            .field("storage", &self.storage.variant())
            .finish()
    }
}

/// Borrowed, non-owning view: a slice of some parent's storage plus a shape.
#[derive(Clone, Copy, Debug)]
pub struct ArrayView<'a> {
    data: &'a [f64],
    count: usize,
    properties: usize,
}

impl<'a> ArrayView<'a> {
    /// Number of items.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Doubles per item.
    pub fn properties(&self) -> usize {
        self.properties
    }

    /// Total element count.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for zero-item views.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The viewed buffer.
    pub fn as_slice(&self) -> &'a [f64] {
        self.data
    }

    /// Read one element. Bounds-checked in every build.
    pub fn get(&self, item: usize, prop: usize) -> f64 {
        assert!(
            item < self.count && prop < self.properties,
            "index ({item}, {prop}) out of bounds for {}x{} view",
            self.count,
            self.properties
        );
        self.data[item * self.properties + prop]
    }

    /// Read one element without bounds checks.
    ///
    /// # Safety
    ///
    /// `item < count` and `prop < properties` must hold; checked only by
    /// `debug_assert!`.
    pub unsafe fn get_unchecked(&self, item: usize, prop: usize) -> f64 {
        debug_assert!(item < self.count && prop < self.properties);
        unsafe { *self.data.get_unchecked(item * self.properties + prop) }
    }

    /// Sub-view over items `[start, stop)` of this view.
    pub fn slice(&self, start: usize, stop: usize) -> Result<ArrayView<'a>, ArrayError> {
        if start >= self.count || stop > self.count || stop < start {
            return Err(ArrayError::RangeOutOfBounds {
                start,
                stop,
                count: self.count,
            });
        }
        Ok(ArrayView {
            data: &self.data[start * self.properties..stop * self.properties],
            count: stop - start,
            properties: self.properties,
        })
    }

    /// Reinterpret the same storage under a new shape.
    pub fn reshape(
        &self,
        new_count: usize,
        new_properties: usize,
    ) -> Result<ArrayView<'a>, ArrayError> {
        if new_count * new_properties != self.data.len() || new_properties == 0 {
            return Err(ArrayError::ShapeMismatch {
                count: self.count,
                properties: self.properties,
                new_count,
                new_properties,
            });
        }
        Ok(ArrayView {
            data: self.data,
            count: new_count,
            properties: new_properties,
        })
    }

    /// Materialize an independent owned copy.
    pub fn to_array(&self) -> NumericArray {
        NumericArray {
            count: self.count,
            properties: self.properties,
            storage: Storage::Owned(OwnedBuf::from_slice(self.data)),
        }
    }

    /// Sum of every element.
    pub fn sum(&self) -> f64 {
        reduce::sum(self.data)
    }

    /// Mean of every element.
    pub fn mean(&self) -> f64 {
        reduce::mean(self.data)
    }

    /// Median of every element.
    pub fn median(&self) -> f64 {
        reduce::median(self.data)
    }

    /// Sum of one property column.
    pub fn sum_property(&self, prop: usize) -> f64 {
        assert!(prop < self.properties);
        reduce::column_sum(self.data, self.properties, prop)
    }

    /// Mean of one property column.
    pub fn mean_property(&self, prop: usize) -> f64 {
        assert!(prop < self.properties);
        reduce::column_mean(self.data, self.properties, prop)
    }

    /// Median of one property column.
    pub fn median_property(&self, prop: usize) -> f64 {
        assert!(prop < self.properties);
        reduce::column_median(self.data, self.properties, prop)
    }
}

fn check_shape(count: usize, properties: usize) -> Result<(), ArrayError> {
    if count == 0 || properties == 0 {
        return Err(ArrayError::EmptyShape { count, properties });
    }
    Ok(())
}
