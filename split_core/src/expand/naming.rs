//! Names for expanded cases and combinations.

/// Format a scale factor the short way: `2` rather than `2.0`, `0.3` as is.
pub fn format_scale(value: f64) -> String {
    // f64's Display already drops a trailing ".0"
    value.to_string()
}

/// One term of a composite case name.
///
/// A scale of 1 is elided, a negative term starts with `-`, and a positive
/// term after the first gets a `+`.
pub fn case_term(scale: f64, load_name: &str, leading: bool) -> String {
    let magnitude = scale.abs();
    let factor = if (magnitude - 1.0).abs() < f64::EPSILON {
        String::new()
    } else {
        format_scale(magnitude)
    };
    let sign = if scale < 0.0 {
        "-"
    } else if leading {
        ""
    } else {
        "+"
    };
    format!("{}{}{}", sign, factor, load_name)
}

/// Composite name of a case from its `(scale, load_name)` terms in row order.
///
/// # Example
/// ```
/// use split_core::expand::naming::case_name;
///
/// assert_eq!(case_name(&[(1.0, "DEAD"), (0.3, "EXP"), (-1.0, "EY")]), "DEAD+0.3EXP-EY");
/// ```
pub fn case_name(terms: &[(f64, &str)]) -> String {
    terms
        .iter()
        .enumerate()
        .map(|(i, (scale, name))| case_term(*scale, name, i == 0))
        .collect()
}

/// Name of the i-th (1-based) of n clones of a linear combination.
pub fn combo_clone_name(combo: &str, index: usize, count: usize) -> String {
    format!("{}({}/{})", combo, index, count)
}
