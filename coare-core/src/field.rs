//! Element-wise helpers shared by every stage of the solver.
//!
//! All quantities are carried as [`Field`]s that share one broadcast shape once the
//! observation has been normalised. Scalars are 0-d fields.

use ndarray::{ArrayD, IxDyn, Zip};

/// A floating point quantity over the broadcast shape.
pub type Field = ArrayD<f64>;

/// A per-element boolean mask over the broadcast shape.
pub type Mask = ArrayD<bool>;

/// A 0-d field holding a single value.
pub fn scalar(value: f64) -> Field {
    ArrayD::from_elem(IxDyn(&[]), value)
}

/// A field of the given shape with every element set to `value`.
pub fn filled(shape: &[usize], value: f64) -> Field {
    ArrayD::from_elem(IxDyn(shape), value)
}

/// Element-wise `if mask { on_true } else { on_false }`.
pub fn select(mask: &Mask, on_true: &Field, on_false: &Field) -> Field {
    Zip::from(mask)
        .and(on_true)
        .and(on_false)
        .map_collect(|&m, &a, &b| if m { a } else { b })
}

/// Overwrite `target` with `update` wherever `mask` is set.
pub fn commit(target: &mut Field, update: &Field, mask: &Mask) {
    Zip::from(target)
        .and(update)
        .and(mask)
        .for_each(|t, &u, &m| {
            if m {
                *t = u;
            }
        });
}

/// Number of set elements in a mask.
pub fn count(mask: &Mask) -> usize {
    mask.iter().filter(|&&m| m).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_scalar_is_zero_dimensional() {
        let s = scalar(3.5);
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.shape(), &[] as &[usize]);
        assert_eq!(s.iter().copied().next(), Some(3.5));
    }

    #[test]
    fn test_select_and_commit() {
        let mask = array![true, false, true].into_dyn();
        let a = array![1.0, 2.0, 3.0].into_dyn();
        let b = array![10.0, 20.0, 30.0].into_dyn();

        assert_eq!(select(&mask, &a, &b), array![1.0, 20.0, 3.0].into_dyn());

        let mut target = b.clone();
        commit(&mut target, &a, &mask);
        assert_eq!(target, array![1.0, 20.0, 3.0].into_dyn());
        assert_eq!(count(&mask), 2);
    }
}
