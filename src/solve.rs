use crate::{FieldError, Result};

/// 主元绝对值低于矩阵最大元素乘以该值时视为奇异
const PIVOT_TOLERANCE: f64 = 1e-12;

/// 带部分主元选取的 LU 分解，矩阵按行优先存储。
///
/// 克里金方程组带有拉格朗日乘子，不是正定矩阵，所以不能用 Cholesky。
#[derive(Debug, Clone)]
pub struct LuDecomposition {
    n: usize,
    lu: Vec<f64>,
    pivots: Vec<usize>,
}

impl LuDecomposition {
    /// 分解 `n` x `n` 矩阵
    ///
    /// # 错误
    /// 矩阵奇异、病态或含有非有限值时返回 [FieldError::InterpolationFailed]
    pub fn factor(mut matrix: Vec<f64>, n: usize) -> Result<Self> {
        debug_assert_eq!(matrix.len(), n * n);
        let scale = matrix.iter().fold(0f64, |max, value| max.max(value.abs()));
        if !scale.is_finite() || scale == 0. {
            return Err(FieldError::InterpolationFailed(
                "克里金方程组含有非有限值或全为零".to_string(),
            ));
        }
        let tolerance = scale * PIVOT_TOLERANCE;
        let mut pivots = vec![0; n];

        for k in 0..n {
            let (pivot_row, pivot) = (k..n)
                .map(|row| (row, matrix[row * n + k].abs()))
                .fold((k, -1.), |best, candidate| {
                    if candidate.1 > best.1 {
                        candidate
                    } else {
                        best
                    }
                });
            if !(pivot > tolerance) {
                return Err(FieldError::InterpolationFailed(format!(
                    "克里金方程组奇异或病态（第 {k} 列主元 {pivot:e}）"
                )));
            }
            pivots[k] = pivot_row;
            if pivot_row != k {
                for col in 0..n {
                    matrix.swap(k * n + col, pivot_row * n + col);
                }
            }

            let diagonal = matrix[k * n + k];
            for row in k + 1..n {
                let factor = matrix[row * n + k] / diagonal;
                matrix[row * n + k] = factor;
                if factor == 0. {
                    continue;
                }
                for col in k + 1..n {
                    matrix[row * n + col] -= factor * matrix[k * n + col];
                }
            }
        }

        Ok(LuDecomposition {
            n,
            lu: matrix,
            pivots,
        })
    }

    /// 矩阵阶数
    pub fn order(&self) -> usize {
        self.n
    }

    /// 原地求解 `A x = b`，`rhs` 传入 `b`，返回时存放 `x`
    pub fn solve_in_place(&self, rhs: &mut [f64]) {
        let n = self.n;
        debug_assert_eq!(rhs.len(), n);

        for (k, &pivot_row) in self.pivots.iter().enumerate() {
            rhs.swap(k, pivot_row);
        }
        for row in 0..n {
            let sum: f64 = (0..row).map(|col| self.lu[row * n + col] * rhs[col]).sum();
            rhs[row] -= sum;
        }
        for row in (0..n).rev() {
            let sum: f64 = (row + 1..n).map(|col| self.lu[row * n + col] * rhs[col]).sum();
            rhs[row] = (rhs[row] - sum) / self.lu[row * n + row];
        }
    }
}
