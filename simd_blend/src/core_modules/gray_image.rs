// THEORY:
// The `gray_image` module holds the two plain data containers every kernel works
// with. Neither of them knows anything about blending.
//
// 1.  **ImageView**: a borrowed, read-only window onto `rows * cols` bytes laid out
//     row-major with no padding (stride == cols). It is validated once, when it is
//     built, so the kernels can index it without re-checking lengths.
// 2.  **ResultBuffer**: the owned output of one kernel invocation. It always has the
//     dimensions of the base image and never shares storage with either input.
//
// Both convert to and from `image::GrayImage` so the I/O layer can hand decoded
// images straight to the kernels and encode the results afterwards.

use image::GrayImage;

use crate::core_modules::error::{BlendError, BlendResult};

/// A validated, read-only view of an 8-bit grayscale image.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    /// Number of rows (image height).
    rows: usize,
    /// Number of columns (image width). Also the row stride.
    cols: usize,
    data: &'a [u8],
}

impl<'a> ImageView<'a> {
    /// Wraps `data` as a `rows x cols` image.
    ///
    /// Fails with [`BlendError::InvalidImage`] when the buffer length does not
    /// match the dimensions. A zero-sized view is allowed here; kernels decide
    /// whether an empty image is acceptable in the role it plays.
    pub fn new(rows: usize, cols: usize, data: &'a [u8]) -> BlendResult<Self> {
        let expected = rows.checked_mul(cols).ok_or_else(|| {
            BlendError::invalid_image(format!("{rows}x{cols} overflows the address space"))
        })?;
        if data.len() != expected {
            return Err(BlendError::invalid_image(format!(
                "buffer of {} bytes cannot hold a {rows}x{cols} image",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// An image with no pixels. Useful as an overlay that contributes nothing.
    pub fn empty() -> ImageView<'static> {
        ImageView {
            rows: 0,
            cols: 0,
            data: &[],
        }
    }

    /// Borrows the raw buffer of a decoded `image::GrayImage`.
    pub fn from_gray(image: &'a GrayImage) -> BlendResult<Self> {
        Self::new(
            image.height() as usize,
            image.width() as usize,
            image.as_raw().as_slice(),
        )
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// Sample at `(row, col)`. Callers guarantee the coordinate is in bounds.
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.cols + col]
    }

    /// The full row `row` as a slice of `cols` samples.
    #[inline]
    pub fn row(&self, row: usize) -> &'a [u8] {
        let start = row * self.cols;
        &self.data[start..start + self.cols]
    }

    /// True when `(row, col)` addresses a real sample of this image.
    #[inline]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    /// Fails unless the view has at least one pixel. Kernels call this on `base`.
    pub(crate) fn require_non_empty(&self, role: &str) -> BlendResult<()> {
        if self.is_empty() {
            return Err(BlendError::invalid_image(format!(
                "{role} image is empty ({}x{})",
                self.rows, self.cols
            )));
        }
        Ok(())
    }
}

/// The owned output of a single kernel invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultBuffer {
    rows: usize,
    cols: usize,
    data: Vec<u8>,
}

impl ResultBuffer {
    /// Allocates a zeroed buffer with the dimensions of `base`.
    pub fn for_base(base: &ImageView<'_>) -> Self {
        Self {
            rows: base.rows(),
            cols: base.cols(),
            data: vec![0u8; base.len()],
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    pub fn at(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.cols + col]
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Read-only view of the blended pixels, e.g. to feed them into another blend.
    pub fn view(&self) -> ImageView<'_> {
        ImageView {
            rows: self.rows,
            cols: self.cols,
            data: &self.data,
        }
    }

    /// Number of positions where `self` and `other` differ, or `None` when the
    /// two buffers do not even have the same dimensions.
    pub fn mismatched_pixels(&self, other: &ResultBuffer) -> Option<usize> {
        if self.rows != other.rows || self.cols != other.cols {
            return None;
        }
        Some(
            self.data
                .iter()
                .zip(&other.data)
                .filter(|(a, b)| a != b)
                .count(),
        )
    }

    /// Hands the pixels to the `image` crate for encoding.
    pub fn into_gray_image(self) -> BlendResult<GrayImage> {
        let width = u32::try_from(self.cols)
            .map_err(|_| BlendError::invalid_image("width does not fit in u32"))?;
        let height = u32::try_from(self.rows)
            .map_err(|_| BlendError::invalid_image("height does not fit in u32"))?;
        GrayImage::from_raw(width, height, self.data)
            .ok_or_else(|| BlendError::invalid_image("buffer does not match its dimensions"))
    }

    /// Fails unless this buffer can receive the blend of `base`.
    pub(crate) fn check_matches(&self, base: &ImageView<'_>) -> BlendResult<()> {
        if self.rows != base.rows() || self.cols != base.cols() {
            return Err(BlendError::invalid_image(format!(
                "output is {}x{} but base is {}x{}",
                self.rows,
                self.cols,
                base.rows(),
                base.cols()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_rejects_length_mismatch() {
        let data = vec![0u8; 10];
        let err = ImageView::new(3, 4, &data).unwrap_err();
        assert!(matches!(err, BlendError::InvalidImage { .. }));
    }

    #[test]
    fn view_rejects_overflowing_dimensions() {
        let err = ImageView::new(usize::MAX, 2, &[]).unwrap_err();
        assert!(matches!(err, BlendError::InvalidImage { .. }));
    }

    #[test]
    fn view_indexes_row_major() {
        let data: Vec<u8> = (0..12).collect();
        let view = ImageView::new(3, 4, &data).unwrap();
        assert_eq!(view.at(0, 0), 0);
        assert_eq!(view.at(1, 2), 6);
        assert_eq!(view.at(2, 3), 11);
        assert_eq!(view.row(1), &[4, 5, 6, 7]);
        assert!(view.contains(2, 3));
        assert!(!view.contains(3, 0));
        assert!(!view.contains(0, 4));
    }

    #[test]
    fn empty_view_is_valid_but_not_a_base() {
        let view = ImageView::empty();
        assert!(view.is_empty());
        assert!(view.require_non_empty("base").is_err());
    }

    #[test]
    fn gray_image_round_trip_keeps_orientation() {
        // 2 rows x 3 cols: width 3, height 2.
        let image = GrayImage::from_raw(3, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let view = ImageView::from_gray(&image).unwrap();
        assert_eq!(view.rows(), 2);
        assert_eq!(view.cols(), 3);
        assert_eq!(view.at(1, 0), 4);

        let mut buffer = ResultBuffer::for_base(&view);
        buffer.as_mut_slice().copy_from_slice(view.as_slice());
        let encoded = buffer.into_gray_image().unwrap();
        assert_eq!(encoded.dimensions(), (3, 2));
        assert_eq!(encoded.get_pixel(0, 1).0, [4]);
    }

    #[test]
    fn mismatch_count_requires_equal_shapes() {
        let a_data = vec![1u8; 4];
        let a = ResultBuffer::for_base(&ImageView::new(2, 2, &a_data).unwrap());
        let b = ResultBuffer::for_base(&ImageView::new(1, 4, &a_data).unwrap());
        assert_eq!(a.mismatched_pixels(&b), None);

        let mut c = a.clone();
        c.as_mut_slice()[3] = 9;
        assert_eq!(a.mismatched_pixels(&c), Some(1));
    }
}
