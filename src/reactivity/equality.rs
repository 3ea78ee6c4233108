// ============================================================================
// spark-store - Equality Functions
// Suppression tests for binding caches and signals
// ============================================================================
//
// A binding only notifies its listeners when the incoming value is not
// "equal" to the cached one. PartialEq is right for almost every stored
// type; floats need NaN-aware comparison or a stored NaN would look like a
// fresh transition on every echo.
// ============================================================================

/// Default strict equality using PartialEq.
///
/// # Example
/// ```
/// use spark_store::reactivity::equality::equals;
///
/// assert!(equals(&"dark", &"dark"));
/// assert!(!equals(&1, &2));
/// ```
pub fn equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// Never equal: every write and every store echo counts as a transition.
///
/// # Example
/// ```
/// use spark_store::reactivity::equality::never_equals;
///
/// assert!(!never_equals(&1, &1));
/// ```
pub fn never_equals<T>(_a: &T, _b: &T) -> bool {
    false
}

/// NaN-aware equality for f64: NaN == NaN.
///
/// # Example
/// ```
/// use spark_store::reactivity::equality::safe_equals_f64;
///
/// assert!(safe_equals_f64(&f64::NAN, &f64::NAN));
/// assert!(!safe_equals_f64(&f64::NAN, &1.0));
/// assert!(safe_equals_f64(&0.5, &0.5));
/// ```
pub fn safe_equals_f64(a: &f64, b: &f64) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a == b
}

/// NaN-aware equality for f32: NaN == NaN.
pub fn safe_equals_f32(a: &f32, b: &f32) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a == b
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_equality() {
        assert!(equals(&String::from("a"), &String::from("a")));
        assert!(!equals(&Some(1), &None));
    }

    #[test]
    fn nan_handling() {
        assert!(safe_equals_f32(&f32::NAN, &f32::NAN));
        assert!(!safe_equals_f32(&1.0, &f32::NAN));
        assert!(safe_equals_f64(&f64::NAN, &f64::NAN));
    }
}
