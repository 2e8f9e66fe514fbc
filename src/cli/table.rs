use crate::opt::Column;
use ansi_term::Style;
use pad::{Alignment, PadStr};
use std::fmt;
use unicode_width::UnicodeWidthStr;

impl Column {
    pub fn title(&self) -> &'static str {
        match self {
            Column::Device => "Device",
            Column::Start => "Start",
            Column::End => "End",
            Column::Sectors => "Sectors",
            Column::Size => "Size",
            Column::Type => "Type",
            Column::GUID => "GUID",
            Column::Attributes => "Attributes",
            Column::Name => "Name",
        }
    }

    /// Numbers are right-aligned.
    fn alignment(&self) -> Alignment {
        match self {
            Column::Start | Column::End | Column::Sectors | Column::Size => Alignment::Right,
            _ => Alignment::Left,
        }
    }
}

/// One row per partition under a bold row of column titles.
pub struct Listing<'a> {
    columns: &'a [Column],
    rows: Vec<Vec<String>>,
}

impl<'a> Listing<'a> {
    pub fn new(columns: &'a [Column]) -> Listing<'a> {
        Listing {
            columns,
            rows: Vec::new(),
        }
    }

    /// Add a row, `cell` giving the text of each column.
    pub fn push<F>(&mut self, mut cell: F)
    where
        F: FnMut(&Column) -> String,
    {
        let row = self.columns.iter().map(|x| cell(x)).collect();
        self.rows.push(row);
    }

    fn width(&self, i: usize) -> usize {
        self.rows
            .iter()
            .map(|row| UnicodeWidthStr::width(row[i].as_str()))
            .chain(std::iter::once(UnicodeWidthStr::width(
                self.columns[i].title(),
            )))
            .max()
            .unwrap_or(0)
    }

    fn write_row<S: AsRef<str>>(
        &self,
        f: &mut fmt::Formatter,
        widths: &[usize],
        row: &[S],
        style: Style,
    ) -> fmt::Result {
        for (i, (column, text)) in self.columns.iter().zip(row).enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            let text = text
                .as_ref()
                .pad_to_width_with_alignment(widths[i], column.alignment());
            write!(f, "{}", style.paint(text))?;
        }
        writeln!(f)
    }
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.columns.is_empty() {
            return Ok(());
        }

        let widths: Vec<_> = (0..self.columns.len()).map(|i| self.width(i)).collect();
        let titles: Vec<_> = self.columns.iter().map(Column::title).collect();
        self.write_row(f, &widths, &titles[..], Style::new().bold())?;
        for row in self.rows.iter() {
            self.write_row(f, &widths, &row[..], Style::new())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn columns_are_aligned() {
        let columns = [Column::Name, Column::Sectors];
        let mut listing = Listing::new(&columns);
        listing.push(|x| match x {
            Column::Name => "rootfs".to_string(),
            _ => "7".to_string(),
        });
        listing.push(|x| match x {
            Column::Name => "é".to_string(),
            _ => "1000".to_string(),
        });

        let output = listing.to_string();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "rootfs       7");
        assert_eq!(lines[2], "é         1000");
        assert!(Listing::new(&[]).to_string().is_empty());
    }
}
