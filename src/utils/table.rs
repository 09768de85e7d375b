/// Plain-text table for printing schedules and comparisons in a terminal
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    col_widths: Vec<usize>,
    right_aligned: Vec<bool>,
}

impl Table {
    /// Create a new table with the given headers, all columns left aligned
    pub fn new(headers: &[&str]) -> Self {
        Table {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            col_widths: headers.iter().map(|h| h.chars().count()).collect(),
            right_aligned: vec![false; headers.len()],
        }
    }

    /// Right-align every column except the first; suits numeric tables
    pub fn numeric(mut self) -> Self {
        for (i, aligned) in self.right_aligned.iter_mut().enumerate() {
            *aligned = i > 0;
        }
        self
    }

    /// Add a row; cells beyond the header count are dropped
    pub fn add_row<S: Into<String>>(&mut self, row: Vec<S>) {
        let mut cells: Vec<String> = row.into_iter().map(Into::into).collect();
        cells.truncate(self.headers.len());

        for (i, cell) in cells.iter().enumerate() {
            self.col_widths[i] = self.col_widths[i].max(cell.chars().count());
        }

        self.rows.push(cells);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let mut output = String::new();

        output.push_str(&self.render_row(&self.headers));
        output.push('\n');
        output.push_str(&self.render_separator());
        output.push('\n');

        for row in &self.rows {
            output.push_str(&self.render_row(row));
            output.push('\n');
        }

        output
    }

    fn render_row(&self, row: &[String]) -> String {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let width = self.col_widths[i];
                if self.right_aligned[i] {
                    format!("{:>width$}", cell, width = width)
                } else {
                    format!("{:<width$}", cell, width = width)
                }
            })
            .collect();
        cells.join(" | ").trim_end().to_string()
    }

    fn render_separator(&self) -> String {
        self.col_widths
            .iter()
            .map(|&width| "-".repeat(width))
            .collect::<Vec<_>>()
            .join("-+-")
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_table() {
        let mut table = Table::new(&["Month", "Payment", "Balance"]).numeric();
        table.add_row(vec!["1", "536.82", "99713.18"]);
        table.add_row(vec!["2", "536.82", "99425.16"]);

        let rendered = table.render();
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Month | Payment |  Balance");
        assert_eq!(lines[1], "------+---------+---------");
        assert!(lines[2].ends_with("99713.18"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_extra_cells_dropped() {
        let mut table = Table::new(&["A"]);
        table.add_row(vec!["x", "y"]);
        assert!(!table.render().contains('y'));
    }
}
