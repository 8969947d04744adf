use std::fmt;

use crate::array::Array;
use crate::backend::Backend;
use crate::dtype::DType;
use crate::error::Result;

/// Controls how arrays are rendered by `Display` and `print`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintOptions {
    /// Decimals for float32 values.
    pub f32_precision: usize,
    /// Decimals for float64 values.
    pub f64_precision: usize,
    /// Values shown at each end of a summarized axis.
    pub edge_items: usize,
    /// Axes longer than this are summarized with `...`.
    pub threshold: usize,
}

impl Default for PrintOptions {
    fn default() -> Self {
        PrintOptions {
            f32_precision: 3,
            f64_precision: 4,
            edge_items: 4,
            threshold: 8,
        }
    }
}

impl PrintOptions {
    pub fn with_edge_items(mut self, edge_items: usize) -> Self {
        self.edge_items = edge_items;
        self
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_precision(mut self, f32_precision: usize, f64_precision: usize) -> Self {
        self.f32_precision = f32_precision;
        self.f64_precision = f64_precision;
        self
    }

    fn element(&self, dtype: DType, v: f64) -> String {
        match dtype {
            DType::F32 => format!("{:.*}", self.f32_precision, v),
            DType::F64 => format!("{:.*}", self.f64_precision, v),
            DType::Bool => if v != 0.0 { "True" } else { "False" }.to_string(),
            _ => format!("{v:.0}."),
        }
    }

    /// Render `axon.array(<nested>, dtype=<name>)`.
    ///
    /// Rows print inline; higher dimensions print one sub-array per line,
    /// indented two spaces per level.
    pub fn render(&self, dims: &[usize], values: &[f64], dtype: DType) -> String {
        let mut out = String::from("axon.array(");
        if dims.is_empty() {
            out.push_str(&self.element(dtype, values.first().copied().unwrap_or(0.0)));
        } else {
            self.render_level(dims, values, dtype, 0, &mut out);
        }
        out.push_str(", dtype=");
        out.push_str(dtype.name());
        out.push(')');
        out
    }

    fn shown(&self, len: usize) -> (Vec<usize>, bool) {
        if len > self.threshold && 2 * self.edge_items < len {
            let head = 0..self.edge_items;
            let tail = len - self.edge_items..len;
            (head.chain(tail).collect(), true)
        } else {
            ((0..len).collect(), false)
        }
    }

    fn render_level(&self, dims: &[usize], values: &[f64], dtype: DType, level: usize, out: &mut String) {
        let (shown, summarized) = self.shown(dims[0]);
        if dims.len() == 1 {
            out.push('[');
            let mut parts: Vec<String> = shown.iter().map(|&i| self.element(dtype, values[i])).collect();
            if summarized {
                parts.insert(self.edge_items, "...".to_string());
            }
            out.push_str(&parts.join(", "));
            out.push(']');
            return;
        }

        let chunk: usize = dims[1..].iter().product();
        let indent = "  ".repeat(level + 1);
        out.push_str("[\n");
        for (n, &i) in shown.iter().enumerate() {
            if n > 0 {
                out.push_str(",\n");
            }
            if summarized && n == self.edge_items {
                out.push_str(&indent);
                out.push_str("...,\n");
            }
            out.push_str(&indent);
            self.render_level(&dims[1..], &values[i * chunk..(i + 1) * chunk], dtype, level + 1, out);
        }
        out.push('\n');
        out.push_str(&"  ".repeat(level));
        out.push(']');
    }
}

impl<B: Backend> Array<B> {
    /// Render with explicit print options.
    pub fn format_with(&self, options: &PrintOptions) -> Result<String> {
        let values = self.to_f64_vec()?;
        Ok(options.render(self.dims(), &values, self.dtype()))
    }

    /// Write the rendered array to stdout. Returns nothing.
    pub fn print(&self, options: &PrintOptions) -> Result<()> {
        println!("{}", self.format_with(options)?);
        Ok(())
    }
}

impl<B: Backend> fmt::Display for Array<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .format_with(&PrintOptions::default())
            .map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}
