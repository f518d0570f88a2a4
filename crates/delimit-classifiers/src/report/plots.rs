use plotly::common::{ColorScale, ColorScalePalette};
use plotly::layout::{Annotation, Axis, Layout};
use plotly::{HeatMap, Plot};

use crate::evaluation::ConfusionMatrix;

/// Plot a confusion matrix as a heat map annotated with the integer counts.
///
/// True classes run down the y axis (class 0 at the top) and predicted
/// classes along the x axis.
pub fn plot_confusion_matrix(confusion_matrix: &ConfusionMatrix) -> Plot {
    let n_classes = confusion_matrix.n_classes();
    let labels: Vec<String> = (0..n_classes).map(|i| format!("Model {}", i)).collect();

    // Heat map rows are drawn bottom-up, so feed them in reverse.
    let counts = confusion_matrix.to_vec();
    let y_labels: Vec<String> = labels.iter().rev().cloned().collect();
    let z: Vec<Vec<usize>> = counts.iter().rev().cloned().collect();

    let trace = HeatMap::new(labels.clone(), y_labels, z)
        .color_scale(ColorScale::Palette(ColorScalePalette::Blues))
        .name("Confusion Matrix");

    let annotations: Vec<Annotation> = counts
        .iter()
        .enumerate()
        .flat_map(|(true_class, row)| {
            let labels = &labels;
            row.iter().enumerate().map(move |(pred_class, count)| {
                Annotation::new()
                    .x(labels[pred_class].as_str())
                    .y(labels[true_class].as_str())
                    .text(&count.to_string())
                    .show_arrow(false)
            })
        })
        .collect();

    let layout = Layout::new()
        .title("Confusion Matrix")
        .width(800)
        .height(600)
        .x_axis(Axis::new().title("Predicted Labels"))
        .y_axis(Axis::new().title("True Labels"))
        .annotations(annotations);

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(layout);

    plot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_confusion_matrix_serializes_counts() {
        let cm = ConfusionMatrix::from_labels(&[0, 0, 1, 1], &[0, 1, 1, 1], 2);
        let plot = plot_confusion_matrix(&cm);
        let json = plot.to_json();

        assert!(json.contains("Confusion Matrix"));
        assert!(json.contains("Predicted Labels"));
        assert!(json.contains("True Labels"));
        assert!(json.contains("Model 1"));
    }
}
