//! Payloads for the rendering and narrative collaborators.

use crime_forecast_crime_models::MonthlyTable;
use crime_forecast_forecast_models::{
    Annotation, ChartPayload, ChartSeries, DataPoint, ForecastPoint, NarrativeSummary,
};

pub const HISTORICAL_SERIES: &str = "Historical";
pub const PREDICTED_SERIES: &str = "Predicted";

#[allow(clippy::cast_precision_loss)]
fn historical_points(table: &MonthlyTable) -> Vec<Option<f64>> {
    table.totals().into_iter().map(|t| Some(t as f64)).collect()
}

/// Chart of the observed months only.
///
/// When the table tracks crime types, each type gets its own series after
/// the totals.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn historical_chart(table: &MonthlyTable) -> ChartPayload {
    let mut series = vec![ChartSeries {
        name: HISTORICAL_SERIES.to_string(),
        points: historical_points(table),
    }];

    if table.tracks_types() {
        let matrix = table.type_matrix();
        for (column, name) in table.crime_types().into_iter().enumerate() {
            series.push(ChartSeries {
                name,
                points: matrix.iter().map(|row| Some(row[column] as f64)).collect(),
            });
        }
    }

    ChartPayload {
        labels: table.months(),
        series,
        annotations: Vec::new(),
    }
}

/// Observed and predicted totals on one shared month axis.
///
/// The historical series is `None` over the forecast months and the
/// predicted series is `None` over the observed months.
#[must_use]
pub fn forecast_chart(
    table: &MonthlyTable,
    points: &[ForecastPoint],
    annotations: &[Annotation],
) -> ChartPayload {
    let history_len = table.len();

    let mut labels = table.months();
    labels.extend(points.iter().map(|p| p.month.clone()));

    let mut historical = historical_points(table);
    historical.resize(history_len + points.len(), None);

    let predicted = std::iter::repeat_n(None, history_len)
        .chain(points.iter().map(|p| Some(p.predicted_value)))
        .collect();

    ChartPayload {
        labels,
        series: vec![
            ChartSeries {
                name: HISTORICAL_SERIES.to_string(),
                points: historical,
            },
            ChartSeries {
                name: PREDICTED_SERIES.to_string(),
                points: predicted,
            },
        ],
        annotations: annotations.to_vec(),
    }
}

/// Dated totals and predictions for the narrative prompt.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn narrative_summary(table: &MonthlyTable, points: &[ForecastPoint]) -> NarrativeSummary {
    NarrativeSummary {
        historical: table
            .rows()
            .iter()
            .map(|row| DataPoint {
                date: row.month.clone(),
                value: row.total as f64,
            })
            .collect(),
        predicted: points
            .iter()
            .map(|p| DataPoint {
                date: p.month.clone(),
                value: p.predicted_value,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use crime_forecast_crime_models::MonthlyCount;
    use crime_forecast_forecast_models::AnnotationKind;

    use super::*;

    fn table(tracks_types: bool) -> MonthlyTable {
        let mut jan = MonthlyCount::new("2024-01");
        jan.total = 3;
        let mut feb = MonthlyCount::new("2024-02");
        feb.total = 5;
        if tracks_types {
            jan.by_type.insert("Burglary".to_string(), 1);
            jan.by_type.insert("Drugs".to_string(), 2);
            feb.by_type.insert("Drugs".to_string(), 5);
        }
        MonthlyTable::new(vec![feb, jan], tracks_types)
    }

    fn points() -> Vec<ForecastPoint> {
        vec![
            ForecastPoint {
                month: "2024-03".to_string(),
                predicted_value: 6.5,
            },
            ForecastPoint {
                month: "2024-04".to_string(),
                predicted_value: 7.0,
            },
        ]
    }

    #[test]
    fn forecast_chart_pads_each_series_over_the_other_range() {
        let chart = forecast_chart(&table(false), &points(), &[]);

        assert_eq!(chart.labels, vec!["2024-01", "2024-02", "2024-03", "2024-04"]);
        assert_eq!(chart.series[0].name, HISTORICAL_SERIES);
        assert_eq!(chart.series[0].points, vec![Some(3.0), Some(5.0), None, None]);
        assert_eq!(chart.series[1].name, PREDICTED_SERIES);
        assert_eq!(chart.series[1].points, vec![None, None, Some(6.5), Some(7.0)]);
        for series in &chart.series {
            assert_eq!(series.points.len(), chart.labels.len());
        }
    }

    #[test]
    fn forecast_chart_carries_annotations() {
        let annotation = Annotation {
            kind: AnnotationKind::Peak,
            index: 0,
            month: "2024-03".to_string(),
            value: 6.5,
        };
        let chart = forecast_chart(&table(false), &points(), std::slice::from_ref(&annotation));
        assert_eq!(chart.annotations, vec![annotation]);
    }

    #[test]
    fn historical_chart_adds_one_series_per_type() {
        let chart = historical_chart(&table(true));

        let names: Vec<&str> = chart.series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![HISTORICAL_SERIES, "Burglary", "Drugs"]);
        assert_eq!(chart.series[1].points, vec![Some(1.0), Some(0.0)]);
        assert_eq!(chart.series[2].points, vec![Some(2.0), Some(5.0)]);
    }

    #[test]
    fn narrative_summary_serializes_dates_and_values() {
        let summary = narrative_summary(&table(false), &points());
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["historical"][0]["date"], "2024-01");
        assert_eq!(json["historical"][1]["value"], 5.0);
        assert_eq!(json["predicted"][1]["date"], "2024-04");
        assert_eq!(json["predicted"][0]["value"], 6.5);
    }
}
