use crate::opcodes::{parse_line, Line};
use std::collections::HashMap;
use tracing::warn;

/// Parsed contract source: one [`Line`] per source line plus the label map.
#[derive(Debug, Clone, Default)]
pub struct Program {
    source: Vec<String>,
    lines: Vec<Line>,
    labels: HashMap<String, usize>,
}

impl Program {
    pub fn parse(source: &str) -> Self {
        let source: Vec<String> = source.lines().map(str::to_string).collect();
        let lines: Vec<Line> = source.iter().map(|text| parse_line(text)).collect();

        let mut labels = HashMap::new();
        for (index, line) in lines.iter().enumerate() {
            if let Line::Label(name) = line {
                if labels.contains_key(name) {
                    warn!(label = %name, line = index, "duplicate label ignored");
                    continue;
                }
                labels.insert(name.clone(), index);
            }
        }

        Self {
            source,
            lines,
            labels,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn source_line(&self, index: usize) -> Option<&str> {
        self.source.get(index).map(String::as_str)
    }

    /// Line index of a label definition; the first definition wins.
    pub fn label(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    pub fn labels(&self) -> &HashMap<String, usize> {
        &self.labels
    }

    /// First executable line at or after `from`.
    pub fn next_executable(&self, from: usize) -> Option<usize> {
        (from..self.lines.len()).find(|&index| self.lines[index].is_executable())
    }

    pub fn first_executable(&self) -> Option<usize> {
        self.next_executable(0)
    }

    pub fn executable_lines(&self) -> impl Iterator<Item = usize> + '_ {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.is_executable())
            .map(|(index, _)| index)
    }
}
