//! The text model format.
//!
//! Models persist as line-oriented, human-readable ASCII:
//!
//! ```text
//! # <feature header>
//! <feature string>
//!
//! # Trees Levels Split_Dists
//! <T> <L> <fit_split_nodes>
//! # <model header description>
//! <model header data>
//!
//! <trees: one line per non-orphan node, blank line after each tree>
//! ```
//!
//! A leaf node line is `1` followed by the distribution's own
//! serialisation; a split node line is `0`, the `P` feature
//! parameters, the threshold, and (when split distributions were
//! fitted) the distribution. Orphans are never written; the reader
//! reconstructs them from the same parent-is-leaf rule the writer
//! skips them by. Numbers are printed with Rust's shortest round-trip
//! formatting, so write -> read -> write reproduces a file byte for
//! byte.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::dist::NodeDistribution;
use crate::error::{ReadError, WriteError};

use super::node::Tree;
use super::{Forest, ForestModel};

// =============================================================================
// Token reader
// =============================================================================

/// Positional reader over a model file's text.
///
/// Offers two granularities, matching how the format mixes line-scoped
/// header fields with whitespace-separated numeric runs: [`take_line`]
/// consumes a whole line, while [`token`] returns the next
/// whitespace-separated token wherever it is, skipping blank lines.
///
/// [`take_line`]: ModelReader::take_line
/// [`token`]: ModelReader::token
pub struct ModelReader<'a> {
    raw: Vec<&'a str>,
    tokens: Vec<Vec<&'a str>>,
    line: usize,
    tok: usize,
}

impl<'a> ModelReader<'a> {
    pub(crate) fn new(content: &'a str) -> Self {
        let raw: Vec<&str> = content.lines().collect();
        let tokens = raw
            .iter()
            .map(|line| line.split_whitespace().collect())
            .collect();
        Self {
            raw,
            tokens,
            line: 0,
            tok: 0,
        }
    }

    /// 1-based line number for error reporting.
    fn line_number(&self) -> usize {
        self.line + 1
    }

    /// Consume and return the next whole line. If the current line was
    /// partially consumed by [`token`](Self::token), it is abandoned
    /// and the following line returned.
    pub(crate) fn take_line(&mut self, context: &'static str) -> Result<&'a str, ReadError> {
        if self.tok > 0 {
            self.line += 1;
            self.tok = 0;
        }
        let line = *self
            .raw
            .get(self.line)
            .ok_or(ReadError::UnexpectedEnd { context })?;
        self.line += 1;
        Ok(line)
    }

    /// The next whitespace-separated token, crossing line boundaries.
    pub(crate) fn token(&mut self, context: &'static str) -> Result<&'a str, ReadError> {
        loop {
            match self.tokens.get(self.line) {
                None => return Err(ReadError::UnexpectedEnd { context }),
                Some(line_tokens) => {
                    if self.tok < line_tokens.len() {
                        let token = line_tokens[self.tok];
                        self.tok += 1;
                        return Ok(token);
                    }
                    self.line += 1;
                    self.tok = 0;
                }
            }
        }
    }

    /// Parse the next token as `T`.
    pub(crate) fn parse<T: FromStr>(&mut self, expected: &'static str) -> Result<T, ReadError> {
        let token = self.token(expected)?;
        let line = self.line_number();
        token.parse().map_err(|_| ReadError::Token {
            expected,
            found: token.to_string(),
            line,
        })
    }

    /// The unconsumed tokens on the current line; leaves the reader at
    /// the start of the next line.
    pub(crate) fn rest_of_line(&mut self) -> Vec<&'a str> {
        let rest = match self.tokens.get(self.line) {
            Some(line_tokens) => line_tokens[self.tok.min(line_tokens.len())..].to_vec(),
            None => Vec::new(),
        };
        self.line += 1;
        self.tok = 0;
        rest
    }
}

/// Strip the `#` marker (and one following space) off a comment line.
fn strip_comment(line: &str) -> &str {
    let rest = line.strip_prefix('#').unwrap_or(line);
    rest.strip_prefix(' ').unwrap_or(rest)
}

fn write_comment<W: Write>(w: &mut W, text: &str) -> std::io::Result<()> {
    if text.is_empty() {
        writeln!(w, "#")
    } else {
        writeln!(w, "# {text}")
    }
}

// =============================================================================
// Writing
// =============================================================================

impl<M: ForestModel<P>, const P: usize> Forest<M, P> {
    /// Write the model to a file.
    pub fn write_to_file<Q: AsRef<Path>>(&self, path: Q) -> Result<(), WriteError> {
        let file = fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Serialise the model to a string.
    pub fn write_to_string(&self) -> Result<String, WriteError> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        Ok(String::from_utf8(buf).expect("model text is always UTF-8"))
    }

    /// Write the model to any writer.
    ///
    /// # Errors
    /// [`WriteError::Invalid`] if the forest holds no trained model.
    pub fn write<W: Write>(&self, w: &mut W) -> Result<(), WriteError> {
        if !self.valid {
            return Err(WriteError::Invalid);
        }

        write_comment(w, &self.feature_header)?;
        writeln!(w, "{}", self.feature_string)?;
        writeln!(w)?;

        writeln!(w, "# Trees Levels Split_Dists")?;
        writeln!(
            w,
            "{} {} {}",
            self.n_trees, self.n_levels, self.fit_split_nodes as u8
        )?;
        write_comment(w, self.model.header_description())?;
        self.model.write_header(w)?;
        writeln!(w)?;
        writeln!(w)?;

        for tree in &self.trees {
            for n in 0..self.n_nodes {
                if tree.is_orphan(n) {
                    continue;
                }
                let node = &tree.nodes[n];
                if node.is_leaf {
                    write!(w, "1 ")?;
                    node.dist
                        .as_ref()
                        .expect("leaf node without distribution")
                        .write_to(w)?;
                } else {
                    write!(w, "0")?;
                    for p in &node.params {
                        write!(w, " {p}")?;
                    }
                    write!(w, " {}", node.thresh)?;
                    if self.fit_split_nodes {
                        write!(w, " ")?;
                        node.dist
                            .as_ref()
                            .expect("split node without distribution")
                            .write_to(w)?;
                    }
                }
                writeln!(w)?;
            }
            writeln!(w)?;
        }
        Ok(())
    }
}

// =============================================================================
// Reading
// =============================================================================

impl<M: ForestModel<P>, const P: usize> Forest<M, P> {
    /// Load a model from a file, optionally truncated.
    ///
    /// `trees_used` loads only the first so many trees of the file.
    /// `max_depth_used` flattens every node beyond that depth to a
    /// leaf, which requires the file to carry split-node
    /// distributions.
    ///
    /// On an I/O error or a truncation-parameter error the forest is
    /// left in its prior state; on a parse error it is left invalid.
    pub fn read_from_file<Q: AsRef<Path>>(
        &mut self,
        path: Q,
        trees_used: Option<usize>,
        max_depth_used: Option<usize>,
    ) -> Result<(), ReadError> {
        let content = fs::read_to_string(path)?;
        self.read_str(&content, trees_used, max_depth_used)
    }

    /// Load a model from text; see
    /// [`read_from_file`](Self::read_from_file).
    pub fn read_str(
        &mut self,
        content: &str,
        trees_used: Option<usize>,
        max_depth_used: Option<usize>,
    ) -> Result<(), ReadError> {
        match self.parse_model(content, trees_used, max_depth_used) {
            Ok(()) => {
                self.valid = true;
                Ok(())
            }
            Err(err) => {
                // Truncation-parameter errors are detected before any
                // state is touched; everything else invalidates.
                if !matches!(
                    err,
                    ReadError::TreesExceedFile { .. }
                        | ReadError::DepthExceedsFile { .. }
                        | ReadError::DepthRequiresSplitDists
                ) {
                    self.valid = false;
                }
                Err(err)
            }
        }
    }

    fn parse_model(
        &mut self,
        content: &str,
        trees_used: Option<usize>,
        max_depth_used: Option<usize>,
    ) -> Result<(), ReadError> {
        let mut reader = ModelReader::new(content);

        let feature_header = strip_comment(reader.take_line("feature header")?).to_string();
        let feature_string = reader.take_line("feature string")?.to_string();
        reader.take_line("header separator")?;
        reader.take_line("dimensions comment")?;

        let n_trees_file: usize = reader.parse("tree count")?;
        let n_levels_file: usize = reader.parse("level count")?;
        let split_flag: u8 = reader.parse("split-distribution flag")?;
        let fit_split_nodes = split_flag != 0;
        if n_trees_file < 1 || n_levels_file < 1 {
            return Err(ReadError::InvalidDimensions(format!(
                "{n_trees_file} trees, {n_levels_file} levels"
            )));
        }

        let n_trees = match trees_used {
            None => n_trees_file,
            Some(0) => {
                return Err(ReadError::InvalidDimensions(
                    "trees_used must be at least 1".to_string(),
                ))
            }
            Some(t) if t > n_trees_file => {
                return Err(ReadError::TreesExceedFile {
                    requested: t,
                    available: n_trees_file,
                })
            }
            Some(t) => t,
        };
        if let Some(depth) = max_depth_used {
            if !fit_split_nodes {
                return Err(ReadError::DepthRequiresSplitDists);
            }
            if depth > n_levels_file {
                return Err(ReadError::DepthExceedsFile {
                    requested: depth,
                    available: n_levels_file,
                });
            }
        }

        reader.take_line("model header comment")?;
        self.model.read_header(&mut reader)?;

        let n_nodes = (1usize << (n_levels_file + 1)) - 1;
        let mut trees = Vec::with_capacity(n_trees);
        for _ in 0..n_trees {
            let mut tree = self.parse_tree(&mut reader, n_nodes, fit_split_nodes)?;
            if let Some(depth) = max_depth_used {
                flatten_to_depth(&mut tree, depth);
            }
            trees.push(tree);
        }

        self.n_trees = n_trees;
        self.n_levels = n_levels_file;
        self.n_nodes = n_nodes;
        self.fit_split_nodes = fit_split_nodes;
        self.trees = trees;
        self.feature_header = feature_header;
        self.feature_string = feature_string;
        Ok(())
    }

    fn parse_tree(
        &self,
        reader: &mut ModelReader<'_>,
        n_nodes: usize,
        fit_split_nodes: bool,
    ) -> Result<Tree<M::NodeDist, P>, ReadError> {
        let mut tree: Tree<M::NodeDist, P> = Tree::new(n_nodes);
        for n in 0..n_nodes {
            if tree.is_orphan(n) {
                // Not present in the file; propagate the leaf marking
                // so deeper descendants are recognised as orphans too.
                tree.nodes[n].is_leaf = true;
                continue;
            }
            let flag: u8 = reader.parse("node leaf flag")?;
            if flag != 0 {
                tree.nodes[n].is_leaf = true;
                let mut dist = self.model.init_node_dist();
                dist.read_from(reader)?;
                tree.nodes[n].dist = Some(dist);
            } else {
                for p in 0..P {
                    tree.nodes[n].params[p] = reader.parse("split parameter")?;
                }
                tree.nodes[n].thresh = reader.parse("split threshold")?;
                if fit_split_nodes {
                    let mut dist = self.model.init_node_dist();
                    dist.read_from(reader)?;
                    tree.nodes[n].dist = Some(dist);
                }
            }
        }
        Ok(tree)
    }
}

/// Flatten every node deeper than `depth` levels below the root:
/// nodes exactly at `depth` become leaves (keeping their fitted
/// distributions), anything deeper becomes an orphan.
fn flatten_to_depth<D, const P: usize>(tree: &mut Tree<D, P>, depth: usize) {
    let first_at_depth = (1usize << depth) - 1;
    let last_at_depth = (1usize << (depth + 1)) - 2;
    for n in first_at_depth..tree.nodes.len() {
        let node = &mut tree.nodes[n];
        if n <= last_at_depth {
            node.is_leaf = true;
        } else {
            node.is_leaf = true;
            node.dist = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_tokens_cross_blank_lines() {
        let mut reader = ModelReader::new("1 2\n\n3\n");
        assert_eq!(reader.token("a").unwrap(), "1");
        assert_eq!(reader.token("b").unwrap(), "2");
        assert_eq!(reader.token("c").unwrap(), "3");
        assert!(matches!(
            reader.token("d"),
            Err(ReadError::UnexpectedEnd { .. })
        ));
    }

    #[test]
    fn reader_take_line_abandons_partial_line() {
        let mut reader = ModelReader::new("1 2 3\nnext line\n");
        assert_eq!(reader.token("a").unwrap(), "1");
        assert_eq!(reader.take_line("b").unwrap(), "next line");
    }

    #[test]
    fn reader_rest_of_line() {
        let mut reader = ModelReader::new("3 alpha beta\n7\n");
        let _: usize = reader.parse("count").unwrap();
        assert_eq!(reader.rest_of_line(), vec!["alpha", "beta"]);
        let next: usize = reader.parse("next").unwrap();
        assert_eq!(next, 7);
    }

    #[test]
    fn reader_reports_bad_tokens_with_line_numbers() {
        let mut reader = ModelReader::new("12\nnot_a_number\n");
        let _: usize = reader.parse("first").unwrap();
        let err = reader.parse::<f32>("threshold").unwrap_err();
        match err {
            ReadError::Token { expected, found, line } => {
                assert_eq!(expected, "threshold");
                assert_eq!(found, "not_a_number");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn strip_comment_forms() {
        assert_eq!(strip_comment("# hello"), "hello");
        assert_eq!(strip_comment("#"), "");
        assert_eq!(strip_comment("plain"), "plain");
    }
}
