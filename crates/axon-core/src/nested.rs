use crate::error::{Error, Result};
use crate::shape::Shape;

/// A nested sequence literal, the input format of array construction.
///
/// A bare scalar has shape `()`; every list level adds one dimension. Sibling
/// lists must have equal lengths.
#[derive(Debug, Clone, PartialEq)]
pub enum NestedData {
    Scalar(f64),
    List(Vec<NestedData>),
}

impl NestedData {
    /// Infer the shape by walking the first element of every level, then
    /// verify that the whole structure is rectangular.
    pub fn shape(&self) -> Result<Shape> {
        let mut dims = Vec::new();
        let mut node = self;
        while let NestedData::List(items) = node {
            dims.push(items.len());
            match items.first() {
                Some(first) => node = first,
                None => break,
            }
        }
        self.check_rectangular(&dims, 0)?;
        Ok(Shape::new(dims))
    }

    fn check_rectangular(&self, dims: &[usize], depth: usize) -> Result<()> {
        match self {
            NestedData::Scalar(_) if depth == dims.len() => Ok(()),
            NestedData::Scalar(_) => Err(Error::RaggedNesting {
                depth,
                expected: dims[depth],
                got: 0,
            }),
            NestedData::List(items) => {
                let expected = match dims.get(depth) {
                    Some(&d) => d,
                    None => {
                        return Err(Error::RaggedNesting {
                            depth,
                            expected: 0,
                            got: items.len(),
                        })
                    }
                };
                if items.len() != expected {
                    return Err(Error::RaggedNesting {
                        depth,
                        expected,
                        got: items.len(),
                    });
                }
                items
                    .iter()
                    .try_for_each(|item| item.check_rectangular(dims, depth + 1))
            }
        }
    }

    /// Flat values in row-major order.
    pub fn flatten(&self) -> Vec<f64> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut Vec<f64>) {
        match self {
            NestedData::Scalar(v) => out.push(*v),
            NestedData::List(items) => items.iter().for_each(|i| i.flatten_into(out)),
        }
    }

    /// Shape and flat values in one pass, as consumed by array creation.
    pub fn to_flat(&self) -> Result<(Shape, Vec<f64>)> {
        let shape = self.shape()?;
        Ok((shape, self.flatten()))
    }

    /// Rebuild a nested structure from row-major values.
    pub fn from_flat(shape: &Shape, data: &[f64]) -> Result<Self> {
        if data.len() != shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                shape: shape.clone(),
                expected: shape.elem_count(),
                got: data.len(),
            });
        }
        Ok(Self::build(shape.dims(), data))
    }

    fn build(dims: &[usize], data: &[f64]) -> Self {
        match dims.split_first() {
            None => NestedData::Scalar(data.first().copied().unwrap_or(0.0)),
            Some((&n, rest)) => {
                let chunk: usize = rest.iter().product();
                NestedData::List(
                    (0..n)
                        .map(|i| Self::build(rest, &data[i * chunk..(i + 1) * chunk]))
                        .collect(),
                )
            }
        }
    }
}

impl From<f64> for NestedData {
    fn from(v: f64) -> Self {
        NestedData::Scalar(v)
    }
}

impl From<i64> for NestedData {
    fn from(v: i64) -> Self {
        NestedData::Scalar(v as f64)
    }
}

impl From<bool> for NestedData {
    fn from(v: bool) -> Self {
        NestedData::Scalar(if v { 1.0 } else { 0.0 })
    }
}

impl<T: Into<NestedData>> From<Vec<T>> for NestedData {
    fn from(v: Vec<T>) -> Self {
        NestedData::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<NestedData> + Clone> From<&[T]> for NestedData {
    fn from(v: &[T]) -> Self {
        NestedData::List(v.iter().cloned().map(Into::into).collect())
    }
}
