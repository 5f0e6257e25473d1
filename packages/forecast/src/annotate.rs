//! Peak and trough detection.

use crime_forecast_forecast_models::{Annotation, AnnotationKind, ForecastPoint};

/// Marks interior local extrema of a sequence.
///
/// An interior index is a peak when its value is strictly greater than both
/// neighbours and a trough when strictly less than both. The first and last
/// values are never annotated, and plateaus produce nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendAnnotator;

impl TrendAnnotator {
    /// Extremum kinds and indices of `values`, in index order.
    #[must_use]
    pub fn extrema(values: &[f64]) -> Vec<(usize, AnnotationKind)> {
        values
            .windows(3)
            .enumerate()
            .filter_map(|(i, w)| {
                let (prev, cur, next) = (w[0], w[1], w[2]);
                if cur > prev && cur > next {
                    Some((i + 1, AnnotationKind::Peak))
                } else if cur < prev && cur < next {
                    Some((i + 1, AnnotationKind::Trough))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Annotates a predicted sequence.
    #[must_use]
    pub fn annotate(points: &[ForecastPoint]) -> Vec<Annotation> {
        let values: Vec<f64> = points.iter().map(|p| p.predicted_value).collect();

        Self::extrema(&values)
            .into_iter()
            .map(|(index, kind)| Annotation {
                kind,
                index,
                month: points[index].month.clone(),
                value: values[index],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(values: &[f64]) -> Vec<ForecastPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| ForecastPoint {
                month: format!("2024-{:02}", i + 1),
                predicted_value: v,
            })
            .collect()
    }

    #[test]
    fn valley_is_one_trough() {
        assert_eq!(
            TrendAnnotator::extrema(&[5.0, 1.0, 5.0]),
            vec![(1, AnnotationKind::Trough)]
        );
    }

    #[test]
    fn hill_is_one_peak() {
        assert_eq!(
            TrendAnnotator::extrema(&[1.0, 5.0, 1.0]),
            vec![(1, AnnotationKind::Peak)]
        );
    }

    #[test]
    fn monotonic_has_no_extrema() {
        assert!(TrendAnnotator::extrema(&[1.0, 2.0, 3.0]).is_empty());
    }

    #[test]
    fn alternating_sequence() {
        assert_eq!(
            TrendAnnotator::extrema(&[1.0, 3.0, 2.0, 5.0, 1.0]),
            vec![
                (1, AnnotationKind::Peak),
                (2, AnnotationKind::Trough),
                (3, AnnotationKind::Peak),
            ]
        );
    }

    #[test]
    fn plateaus_and_short_sequences_are_ignored() {
        assert!(TrendAnnotator::extrema(&[1.0, 3.0, 3.0, 1.0]).is_empty());
        assert!(TrendAnnotator::extrema(&[1.0, 2.0]).is_empty());
        assert!(TrendAnnotator::extrema(&[]).is_empty());
    }

    #[test]
    fn annotations_carry_month_and_value() {
        let annotations = TrendAnnotator::annotate(&points(&[4.0, 9.0, 2.0, 6.0]));

        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].kind, AnnotationKind::Peak);
        assert_eq!(annotations[0].month, "2024-02");
        assert!((annotations[0].value - 9.0).abs() < f64::EPSILON);
        assert_eq!(annotations[1].kind, AnnotationKind::Trough);
        assert_eq!(annotations[1].index, 2);
    }
}
