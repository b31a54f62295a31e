//! Depth frame types.
//!
//! Two encodings are supported: `u16` millimetres (0 = no measurement) and
//! `f32` metres (non-finite or non-positive = no measurement). Consumers go
//! through [`DepthFrame`], which hides the encoding behind a metres reading.

/// Errors raised when wrapping a depth buffer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DepthImageError {
    #[error("depth buffer has {got} samples, expected {expected} ({width}x{height})")]
    BufferSize {
        width: usize,
        height: usize,
        expected: usize,
        got: usize,
    },
    #[error("depth image dimensions overflow ({width}x{height})")]
    Dimensions { width: usize, height: usize },
}

/// Pixel type of a depth frame.
pub trait DepthSample: Copy + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    /// Value written into flagged blocks of an annotated frame.
    const MARKER: Self;

    /// Depth in metres, `None` for the encoding's "no measurement" value.
    fn to_meters(self) -> Option<f64>;

    /// Depth in metres when valid and inside `[min, max]` (inclusive).
    fn meters_within(self, min: f64, max: f64) -> Option<f64> {
        self.to_meters().filter(|d| (min..=max).contains(d))
    }
}

impl DepthSample for u16 {
    const MARKER: Self = 10_000;

    #[inline]
    fn to_meters(self) -> Option<f64> {
        (self != 0).then(|| f64::from(self) / 1000.0)
    }
}

impl DepthSample for f32 {
    const MARKER: Self = 10.0;

    #[inline]
    fn to_meters(self) -> Option<f64> {
        (self.is_finite() && self > 0.0).then_some(f64::from(self))
    }

    /// Bounds are narrowed to `f32` first, so a sample written from the
    /// same decimal value as a bound is inside it.
    #[inline]
    fn meters_within(self, min: f64, max: f64) -> Option<f64> {
        if self >= min as f32 && self <= max as f32 {
            self.to_meters()
        } else {
            None
        }
    }
}

/// Read access to a depth frame, independent of its pixel encoding.
pub trait DepthFrame {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Depth at `(row, col)` in metres; `None` for invalid or out-of-bounds pixels.
    fn depth_at(&self, row: usize, col: usize) -> Option<f64>;

    /// Like [`depth_at`](Self::depth_at), also `None` outside `[min, max]` metres.
    fn depth_within(&self, row: usize, col: usize, min: f64, max: f64) -> Option<f64> {
        self.depth_at(row, col).filter(|d| (min..=max).contains(d))
    }
}

fn checked_len(width: usize, height: usize) -> Result<usize, DepthImageError> {
    width
        .checked_mul(height)
        .ok_or(DepthImageError::Dimensions { width, height })
}

/// Borrowed row-major depth buffer, `data.len() == width * height`.
#[derive(Clone, Copy, Debug)]
pub struct DepthImageView<'a, T> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [T],
}

impl<'a, T: DepthSample> DepthImageView<'a, T> {
    /// Wrap a buffer, checking its length against the dimensions.
    pub fn new(width: usize, height: usize, data: &'a [T]) -> Result<Self, DepthImageError> {
        let expected = checked_len(width, height)?;
        if data.len() != expected {
            return Err(DepthImageError::BufferSize {
                width,
                height,
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// True when the buffer length matches the dimensions.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        checked_len(self.width, self.height).is_ok_and(|n| n == self.data.len())
    }

    /// Raw sample at `(row, col)`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.data.get(row * self.width + col).copied()
    }

    /// Owned copy of the frame.
    pub fn to_owned_image(&self) -> DepthImage<T> {
        DepthImage {
            width: self.width,
            height: self.height,
            data: self.data.to_vec(),
        }
    }
}

impl<T: DepthSample> DepthFrame for DepthImageView<'_, T> {
    #[inline]
    fn width(&self) -> usize {
        self.width
    }

    #[inline]
    fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn depth_at(&self, row: usize, col: usize) -> Option<f64> {
        self.get(row, col)?.to_meters()
    }

    #[inline]
    fn depth_within(&self, row: usize, col: usize, min: f64, max: f64) -> Option<f64> {
        self.get(row, col)?.meters_within(min, max)
    }
}

/// Owned row-major depth buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthImage<T> {
    pub width: usize,
    pub height: usize,
    pub data: Vec<T>,
}

impl<T: DepthSample> DepthImage<T> {
    pub fn new(width: usize, height: usize, data: Vec<T>) -> Result<Self, DepthImageError> {
        DepthImageView::new(width, height, &data)?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Frame with every pixel set to `value`.
    pub fn filled(width: usize, height: usize, value: T) -> Result<Self, DepthImageError> {
        let len = checked_len(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![value; len],
        })
    }

    /// Frame built pixel by pixel from `f(row, col)`.
    pub fn from_fn(
        width: usize,
        height: usize,
        mut f: impl FnMut(usize, usize) -> T,
    ) -> Result<Self, DepthImageError> {
        let len = checked_len(width, height)?;
        let mut data = Vec::with_capacity(len);
        for row in 0..height {
            for col in 0..width {
                data.push(f(row, col));
            }
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn view(&self) -> DepthImageView<'_, T> {
        DepthImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        self.view().get(row, col)
    }

    /// Overwrite one pixel; out-of-bounds writes are ignored.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        if row < self.height && col < self.width {
            self.data[row * self.width + col] = value;
        }
    }
}

impl<T: DepthSample> DepthFrame for DepthImage<T> {
    #[inline]
    fn width(&self) -> usize {
        self.width
    }

    #[inline]
    fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn depth_at(&self, row: usize, col: usize) -> Option<f64> {
        self.get(row, col)?.to_meters()
    }

    #[inline]
    fn depth_within(&self, row: usize, col: usize, min: f64, max: f64) -> Option<f64> {
        self.get(row, col)?.meters_within(min, max)
    }
}
