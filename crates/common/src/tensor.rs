use crate::error::{Result, SpeedReaderError};

/// A contiguous array of 32-bit floats plus an ordered list of integer
/// dimensions. Invariant: `data.len() == shape.iter().product()`.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorBuffer {
    data: Vec<f32>,
    shape: Vec<usize>,
}

impl TensorBuffer {
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(SpeedReaderError::preprocessing(format!(
                "tensor buffer has {} elements, shape {:?} requires {}",
                data.len(),
                shape,
                expected
            )));
        }
        Ok(Self { data, shape })
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn into_parts(self) -> (Vec<f32>, Vec<usize>) {
        (self.data, self.shape)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Prepends a leading dimension of 1, per the batch-dimension convention
    /// used when handing a single sample to a batched model.
    pub fn with_leading_batch_dim(mut self) -> Self {
        self.shape.insert(0, 1);
        self
    }

    /// Drops a leading dimension of 1. No-op if the leading dimension isn't 1.
    pub fn without_leading_batch_dim(mut self) -> Self {
        if self.shape.first() == Some(&1) && self.shape.len() > 1 {
            self.shape.remove(0);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_shape_mismatch() {
        let err = TensorBuffer::new(vec![1.0, 2.0, 3.0], vec![2, 2]).unwrap_err();
        assert!(matches!(err, SpeedReaderError::PreprocessingFault(_)));
    }

    #[test]
    fn batch_dim_round_trips() {
        let t = TensorBuffer::new(vec![1.0; 12], vec![3, 4]).unwrap();
        let batched = t.clone().with_leading_batch_dim();
        assert_eq!(batched.shape(), &[1, 3, 4]);
        let unbatched = batched.without_leading_batch_dim();
        assert_eq!(unbatched.shape(), t.shape());
    }
}
