use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{NnError, Result};

/// Dense row-major `f64` buffer with an n-dimensional shape.
///
/// A rank-0 array (empty shape) holds exactly one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawArray")]
pub struct NdArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

#[derive(Deserialize)]
struct RawArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl TryFrom<RawArray> for NdArray {
    type Error = NnError;

    fn try_from(raw: RawArray) -> Result<Self> {
        NdArray::from_vec(raw.data, &raw.shape)
    }
}

impl NdArray {
    pub fn zeros(shape: &[usize]) -> NdArray {
        NdArray::full(shape, 0.0)
    }

    pub fn full(shape: &[usize], value: f64) -> NdArray {
        NdArray {
            shape: shape.to_vec(),
            data: vec![value; shape.iter().product()],
        }
    }

    pub fn scalar(value: f64) -> NdArray {
        NdArray { shape: vec![], data: vec![value] }
    }

    pub fn from_vec(data: Vec<f64>, shape: &[usize]) -> Result<NdArray> {
        let expected = element_count(shape).ok_or_else(|| {
            NnError::shape("from_vec", format!("shape {:?} has too many elements", shape))
        })?;
        if data.len() != expected {
            return Err(NnError::shape(
                "from_vec",
                format!("shape {:?} needs {} elements, got {}", shape, expected, data.len()),
            ));
        }
        Ok(NdArray { shape: shape.to_vec(), data })
    }

    /// Builds a (rows × cols) array from equally long rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<NdArray> {
        let cols = rows.first().map_or(0, |r| r.len());
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(NnError::shape(
                "from_rows",
                format!("row {} has {} columns, expected {}", i, row.len(), cols),
            ));
        }
        let data = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Ok(NdArray { shape: vec![rows.len(), cols], data })
    }

    /// Uniform samples in `[-bound, bound)`.
    pub fn uniform<R: Rng + ?Sized>(shape: &[usize], bound: f64, rng: &mut R) -> NdArray {
        let data = (0..shape.iter().product::<usize>())
            .map(|_| (rng.gen::<f64>() * 2.0 - 1.0) * bound)
            .collect();
        NdArray { shape: shape.to_vec(), data }
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        // Both uniforms in (0, 1] so ln never sees 0.
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn normal<R: Rng + ?Sized>(rows: usize, cols: usize, std_dev: f64, rng: &mut R) -> NdArray {
        let data = (0..rows * cols)
            .map(|_| NdArray::sample_standard_normal(rng) * std_dev)
            .collect();
        NdArray { shape: vec![rows, cols], data }
    }

    /// He initialization: samples from N(0, sqrt(2 / cols)).
    ///
    /// Recommended before ReLU layers. `cols` is the fan-in.
    pub fn he<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> NdArray {
        NdArray::normal(rows, cols, (2.0 / cols as f64).sqrt(), rng)
    }

    /// Xavier (Glorot) initialization: samples from N(0, sqrt(1 / cols)).
    pub fn xavier<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> NdArray {
        NdArray::normal(rows, cols, (1.0 / cols as f64).sqrt(), rng)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Returns `(rows, cols)` or a shape error naming `op` if the array is not 2-D.
    pub fn dims2(&self, op: &'static str) -> Result<(usize, usize)> {
        match self.shape.as_slice() {
            &[rows, cols] => Ok((rows, cols)),
            other => Err(NnError::shape(op, format!("expected a 2-D operand, got shape {:?}", other))),
        }
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let cols = self.shape.last().copied().unwrap_or(1);
        &self.data[i * cols..(i + 1) * cols]
    }

    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn map<F>(&self, functor: F) -> NdArray
    where
        F: Fn(f64) -> f64,
    {
        NdArray {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    /// Element-wise combination of two arrays of identical shape.
    pub fn zip_map<F>(&self, other: &NdArray, op: &'static str, functor: F) -> Result<NdArray>
    where
        F: Fn(f64, f64) -> f64,
    {
        self.expect_same_shape(other, op)?;
        Ok(NdArray {
            shape: self.shape.clone(),
            data: self.data.iter().zip(&other.data).map(|(&a, &b)| functor(a, b)).collect(),
        })
    }

    /// `self += alpha * other`, shapes must match.
    pub fn scaled_add(&mut self, alpha: f64, other: &NdArray) -> Result<()> {
        self.expect_same_shape(other, "scaled_add")?;
        for (x, y) in self.data.iter_mut().zip(&other.data) {
            *x += alpha * y;
        }
        Ok(())
    }

    pub fn add_assign(&mut self, other: &NdArray) -> Result<()> {
        self.scaled_add(1.0, other)
    }

    pub fn transpose(&self) -> Result<NdArray> {
        let (rows, cols) = self.dims2("transpose")?;
        let mut data = vec![0.0; rows * cols];
        for i in 0..rows {
            for j in 0..cols {
                data[j * rows + i] = self.data[i * cols + j];
            }
        }
        Ok(NdArray { shape: vec![cols, rows], data })
    }

    /// Matrix product of two 2-D arrays.
    pub fn matmul(&self, rhs: &NdArray) -> Result<NdArray> {
        let (m, k) = self.dims2("matmul")?;
        let (k2, n) = rhs.dims2("matmul")?;
        if k != k2 {
            return Err(NnError::shape(
                "matmul",
                format!("inner dimensions differ: {:?} x {:?}", self.shape, rhs.shape),
            ));
        }
        let mut data = vec![0.0; m * n];
        for i in 0..m {
            let out = &mut data[i * n..(i + 1) * n];
            for p in 0..k {
                let a = self.data[i * k + p];
                let b_row = &rhs.data[p * n..(p + 1) * n];
                for (o, &b) in out.iter_mut().zip(b_row) {
                    *o += a * b;
                }
            }
        }
        Ok(NdArray { shape: vec![m, n], data })
    }

    /// Column sums of a 2-D array, as a 1-D array of length `cols`.
    pub fn sum_rows(&self) -> Result<NdArray> {
        let (rows, cols) = self.dims2("sum_rows")?;
        let mut data = vec![0.0; cols];
        for i in 0..rows {
            for (acc, &x) in data.iter_mut().zip(&self.data[i * cols..(i + 1) * cols]) {
                *acc += x;
            }
        }
        Ok(NdArray { shape: vec![cols], data })
    }

    /// Index of the largest element of each row of a 2-D array.
    pub fn argmax_rows(&self) -> Result<Vec<usize>> {
        let (rows, _) = self.dims2("argmax_rows")?;
        Ok((0..rows).map(|i| argmax(self.row(i))).collect())
    }

    fn expect_same_shape(&self, other: &NdArray, op: &'static str) -> Result<()> {
        if self.shape != other.shape {
            return Err(NnError::shape(
                op,
                format!("operand shapes differ: {:?} vs {:?}", self.shape, other.shape),
            ));
        }
        Ok(())
    }
}

/// Product of `shape`, or `None` if it overflows `usize`.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// Index of the maximum element in a slice.
pub fn argmax(v: &[f64]) -> usize {
    v.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_rejects_wrong_length() {
        let err = NdArray::from_vec(vec![1.0, 2.0, 3.0], &[2, 2]).unwrap_err();
        assert!(err.is_shape_error());
    }

    #[test]
    fn rank_zero_holds_one_element() {
        let s = NdArray::scalar(3.5);
        assert_eq!(s.rank(), 0);
        assert_eq!(s.data(), &[3.5]);
        assert_eq!(NdArray::zeros(&[]).len(), 1);
    }

    #[test]
    fn matmul_and_transpose() {
        let a = NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let b = a.transpose().unwrap();
        assert_eq!(b.shape(), &[3, 2]);
        assert_eq!(b.data(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);

        let c = a.matmul(&b).unwrap();
        assert_eq!(c.shape(), &[2, 2]);
        assert_eq!(c.data(), &[14.0, 32.0, 32.0, 77.0]);

        assert!(a.matmul(&a).unwrap_err().is_shape_error());
    }

    #[test]
    fn sum_rows_and_argmax() {
        let a = NdArray::from_rows(&[vec![1.0, 5.0], vec![3.0, 2.0]]).unwrap();
        assert_eq!(a.sum_rows().unwrap().data(), &[4.0, 7.0]);
        assert_eq!(a.argmax_rows().unwrap(), vec![1, 0]);
    }

    #[test]
    fn deserialize_validates_shape() {
        let bad = r#"{"shape":[2,2],"data":[1.0]}"#;
        assert!(serde_json::from_str::<NdArray>(bad).is_err());
        let good = r#"{"shape":[2],"data":[1.0,2.0]}"#;
        let a: NdArray = serde_json::from_str(good).unwrap();
        assert_eq!(a.shape(), &[2]);
    }

    #[test]
    fn overflowing_shape_is_rejected() {
        let huge = r#"{"shape":[4294967296,4294967296],"data":[]}"#;
        assert!(serde_json::from_str::<NdArray>(huge).is_err());

        let err = NdArray::from_vec(vec![], &[usize::MAX, 2]).unwrap_err();
        assert!(err.is_shape_error());
        assert_eq!(element_count(&[usize::MAX, 0]), Some(0));
        assert_eq!(element_count(&[usize::MAX, 2]), None);
    }
}
