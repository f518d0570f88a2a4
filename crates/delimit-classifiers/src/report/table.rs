use std::fmt;
use std::io::Write;

use ndarray::Array2;

use crate::error::Result;
use crate::models::classifier_trait::argmax_rows;

/// Per-class scores for a set of replicates: one row per input sample
/// ("Replicate N", 1-based) and one column per class ("Model K", 0-based).
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionTable {
    scores: Array2<f32>,
}

impl PredictionTable {
    /// Wrap a (samples x classes) score array; values are kept verbatim.
    pub fn from_scores(scores: Array2<f32>) -> Self {
        Self { scores }
    }

    pub fn scores(&self) -> &Array2<f32> {
        &self.scores
    }

    pub fn n_replicates(&self) -> usize {
        self.scores.nrows()
    }

    pub fn n_models(&self) -> usize {
        self.scores.ncols()
    }

    pub fn headers(&self) -> Vec<String> {
        (0..self.n_models()).map(|k| format!("Model {}", k)).collect()
    }

    pub fn row_labels(&self) -> Vec<String> {
        (0..self.n_replicates()).map(|i| format!("Replicate {}", i + 1)).collect()
    }

    /// Highest-scoring model of every replicate.
    pub fn best_model(&self) -> Vec<usize> {
        argmax_rows(&self.scores)
    }

    /// Write the table as delimited text with a header row.
    pub fn write_csv<W: Write>(&self, writer: W, delimiter: u8) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().delimiter(delimiter).from_writer(writer);

        let mut header = vec![String::new()];
        header.extend(self.headers());
        writer.write_record(&header)?;

        for (label, row) in self.row_labels().iter().zip(self.scores.rows()) {
            let mut record = vec![label.clone()];
            record.extend(row.iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }

        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    fn cells(&self) -> Vec<Vec<String>> {
        let mut cells = Vec::with_capacity(self.n_replicates() + 1);
        let mut header = vec![String::new()];
        header.extend(self.headers());
        cells.push(header);
        for (label, row) in self.row_labels().into_iter().zip(self.scores.rows()) {
            let mut line = vec![label];
            line.extend(row.iter().map(|v| v.to_string()));
            cells.push(line);
        }
        cells
    }
}

impl fmt::Display for PredictionTable {
    /// Boxed grid, header separated by a double rule.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells = self.cells();
        let n_cols = cells[0].len();
        let widths: Vec<usize> = (0..n_cols)
            .map(|c| cells.iter().map(|row| row[c].chars().count()).max().unwrap_or(0))
            .collect();

        let rule = |left: &str, fill: &str, mid: &str, right: &str| -> String {
            let segments: Vec<String> = widths.iter().map(|w| fill.repeat(w + 2)).collect();
            format!("{}{}{}", left, segments.join(mid), right)
        };

        writeln!(f, "{}", rule("╒", "═", "╤", "╕"))?;
        for (i, row) in cells.iter().enumerate() {
            let padded: Vec<String> = row
                .iter()
                .zip(&widths)
                .enumerate()
                .map(|(c, (cell, &w))| {
                    if c == 0 || i == 0 {
                        format!(" {:<w$} ", cell, w = w)
                    } else {
                        format!(" {:>w$} ", cell, w = w)
                    }
                })
                .collect();
            writeln!(f, "│{}│", padded.join("│"))?;

            if i == 0 {
                writeln!(f, "{}", rule("╞", "═", "╪", "╡"))?;
            } else if i + 1 < cells.len() {
                writeln!(f, "{}", rule("├", "─", "┼", "┤"))?;
            }
        }
        write!(f, "{}", rule("╘", "═", "╧", "╛"))
    }
}
