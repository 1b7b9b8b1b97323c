use super::ColorScale;
use serde::Serialize;

/// One legend swatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub color: String,
    pub label: String,
}

/// Human-readable range label per bucket: `"lower–upper"`, and `">lower"` for
/// the open-ended last bucket.
pub fn bucket_labels(scale: &ColorScale) -> Vec<String> {
    let last = scale.len().saturating_sub(1);
    (0..scale.len())
        .map(|i| {
            let (lower, upper) = scale.bucket_bounds(i);
            if i == last {
                format!(">{}", format_rounded(lower))
            } else {
                format!("{}–{}", format_rounded(lower), format_rounded(upper))
            }
        })
        .collect()
}

fn format_rounded(value: f64) -> String {
    // Saturating cast: anything past u64::MAX prints as u64::MAX
    group_thousands(value.round() as u64)
}

/// Format an integer with `,` between groups of three digits.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale(values: &[f64], n: usize) -> ColorScale {
        let colors: Vec<String> = (0..n).map(|i| format!("c{i}")).collect();
        ColorScale::new(values, &colors).unwrap()
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(100000), "100,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_decade_labels() {
        let labels = bucket_labels(&scale(&[10.0, 100.0, 1000.0, 10000.0, 100000.0], 5));
        assert_eq!(
            labels,
            vec!["10–100", "100–1,000", "1,000–10,000", "10,000–100,000", ">100,000"]
        );
    }

    #[test]
    fn test_identical_values_labels() {
        let labels = bucket_labels(&scale(&[100.0, 100.0], 3));
        assert_eq!(labels, vec!["100–100", "100–100", ">100"]);
    }

    #[test]
    fn test_labels_round_to_nearest() {
        // log10 range [0, 1] over 2 buckets: boundary at 10^0.5 ≈ 3.16
        let labels = bucket_labels(&scale(&[1.0, 10.0], 3));
        assert_eq!(labels, vec!["1–3", "3–10", ">10"]);
    }
}
