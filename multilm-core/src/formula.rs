//! Model formula parsing.
//!
//! Formulas follow the conventions of the multilevel-modeling
//! literature: `response ~ a + b*c` where `b*c` crosses two variables
//! (main effects plus their interaction) and `b:c` is the interaction
//! alone. The intercept is implicit; a `0` term removes it. Variable
//! names are identifiers (letters, digits, underscores) -- columns with
//! other characters must be renamed before fitting.

use anyhow::{bail, Result};

/// One additive term: a single variable, or an interaction of several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    /// Variables whose (encoded) columns are multiplied together.
    pub factors: Vec<String>,
}

impl Term {
    /// Display name, e.g. "n_back:lead".
    pub fn name(&self) -> String {
        self.factors.join(":")
    }
}

/// A fixed-effects model formula: response and additive terms.
#[derive(Debug, Clone)]
pub struct Formula {
    pub response: String,
    pub terms: Vec<Term>,
    pub intercept: bool,
}

impl Formula {
    /// Parse `response ~ term + term + ...`.
    pub fn parse(input: &str) -> Result<Formula> {
        let mut sides = input.split('~');
        let lhs = sides
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Formula is missing a response variable"))?;
        let rhs = match (sides.next(), sides.next()) {
            (Some(r), None) => r.trim(),
            _ => bail!("Formula must contain exactly one '~': '{}'", input),
        };

        check_identifier(lhs)?;
        let (terms, intercept) = parse_terms(rhs)?;

        Ok(Formula {
            response: lhs.to_string(),
            terms,
            intercept,
        })
    }

    /// All distinct column names the formula references, response first.
    pub fn columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = vec![self.response.as_str()];
        for term in &self.terms {
            for f in &term.factors {
                if !cols.contains(&f.as_str()) {
                    cols.push(f);
                }
            }
        }
        cols
    }
}

/// A random-effects formula: the columns whose coefficients vary by
/// group. The leading `~` is optional; the intercept is implicit and a
/// `0` term removes it (at least one slope is then required).
#[derive(Debug, Clone)]
pub struct RandomFormula {
    pub terms: Vec<Term>,
    pub intercept: bool,
}

impl RandomFormula {
    /// A random intercept only, the default grouping structure.
    pub fn intercept_only() -> RandomFormula {
        RandomFormula {
            terms: Vec::new(),
            intercept: true,
        }
    }

    pub fn parse(input: &str) -> Result<RandomFormula> {
        let rhs = input.trim().strip_prefix('~').unwrap_or(input.trim());
        if rhs.contains('~') {
            bail!("Random-effects formula has no response side: '{}'", input);
        }
        let (terms, intercept) = parse_terms(rhs)?;
        if terms.is_empty() && !intercept {
            bail!("Random-effects formula removes the intercept but names no slopes");
        }
        Ok(RandomFormula { terms, intercept })
    }

    pub fn columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = Vec::new();
        for term in &self.terms {
            for f in &term.factors {
                if !cols.contains(&f.as_str()) {
                    cols.push(f);
                }
            }
        }
        cols
    }
}

/// Parse the right-hand side of a formula into deduplicated terms plus
/// the intercept flag.
fn parse_terms(rhs: &str) -> Result<(Vec<Term>, bool)> {
    if rhs.trim().is_empty() {
        return Ok((Vec::new(), true));
    }

    let mut terms: Vec<Term> = Vec::new();
    let mut intercept = true;

    for chunk in rhs.split('+') {
        let chunk = chunk.trim();
        match chunk {
            "" => bail!("Empty term in formula (stray '+'?)"),
            "1" => {}
            "0" => intercept = false,
            _ => {
                for term in expand_chunk(chunk)? {
                    if !terms.contains(&term) {
                        terms.push(term);
                    }
                }
            }
        }
    }

    Ok((terms, intercept))
}

/// Expand one additive chunk. `:` binds tighter than `*`; `a*b`
/// expands to `a + b + a:b`, and `a*b*c` to all mains, two-way, and
/// three-way interactions.
fn expand_chunk(chunk: &str) -> Result<Vec<Term>> {
    let parts: Vec<Vec<String>> = chunk
        .split('*')
        .map(|p| {
            p.split(':')
                .map(|f| {
                    let f = f.trim();
                    check_identifier(f)?;
                    Ok(f.to_string())
                })
                .collect::<Result<Vec<String>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    let m = parts.len();
    let mut terms = Vec::new();
    // Subsets of the crossed parts, ordered mains-first.
    for size in 1..=m {
        for mask in 1u32..(1 << m) {
            if mask.count_ones() as usize != size {
                continue;
            }
            let mut factors = Vec::new();
            for (i, part) in parts.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    factors.extend(part.iter().cloned());
                }
            }
            terms.push(Term { factors });
        }
    }
    Ok(terms)
}

fn check_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if !valid {
        bail!(
            "'{}' is not a valid variable name (letters, digits and '_' only; \
             rename the column first)",
            name
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(f: &Formula) -> Vec<String> {
        f.terms.iter().map(|t| t.name()).collect()
    }

    #[test]
    fn test_simple() {
        let f = Formula::parse("TLC_takeover ~ TLC_failure").unwrap();
        assert_eq!(f.response, "TLC_takeover");
        assert_eq!(names(&f), vec!["TLC_failure"]);
        assert!(f.intercept);
    }

    #[test]
    fn test_additive() {
        let f = Formula::parse("y ~ a + b + c").unwrap();
        assert_eq!(names(&f), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_star_expansion() {
        let f = Formula::parse("e_norm ~ n_back * lead").unwrap();
        assert_eq!(names(&f), vec!["n_back", "lead", "n_back:lead"]);
    }

    #[test]
    fn test_three_way_star() {
        let f = Formula::parse("y ~ a * b * c").unwrap();
        assert_eq!(
            names(&f),
            vec!["a", "b", "c", "a:b", "a:c", "b:c", "a:b:c"]
        );
    }

    #[test]
    fn test_explicit_interaction() {
        let f = Formula::parse("y ~ a:b").unwrap();
        assert_eq!(names(&f), vec!["a:b"]);
    }

    #[test]
    fn test_intercept_removal() {
        let f = Formula::parse("y ~ 0 + x").unwrap();
        assert!(!f.intercept);
        assert_eq!(names(&f), vec!["x"]);
        let f = Formula::parse("y ~ 1 + x").unwrap();
        assert!(f.intercept);
    }

    #[test]
    fn test_dedup() {
        let f = Formula::parse("y ~ a + a*b").unwrap();
        assert_eq!(names(&f), vec!["a", "b", "a:b"]);
    }

    #[test]
    fn test_columns() {
        let f = Formula::parse("y ~ a * b + c:a").unwrap();
        assert_eq!(f.columns(), vec!["y", "a", "b", "c"]);
    }

    #[test]
    fn test_invalid_name_rejected() {
        // Dots are not identifier characters; the column must be renamed.
        assert!(Formula::parse("e.norm ~ x").is_err());
        assert!(Formula::parse("y ~ e.norm").is_err());
        assert!(Formula::parse("y ~ 2x").is_err());
    }

    #[test]
    fn test_malformed() {
        assert!(Formula::parse("y ~ x ~ z").is_err());
        assert!(Formula::parse("y").is_err());
        assert!(Formula::parse("~ x").is_err());
        assert!(Formula::parse("y ~ a + + b").is_err());
    }

    #[test]
    fn test_random_formula() {
        let r = RandomFormula::parse("~ n_back").unwrap();
        assert!(r.intercept);
        assert_eq!(r.terms[0].name(), "n_back");

        let r = RandomFormula::parse("n_back * lead").unwrap();
        assert_eq!(r.terms.len(), 3);

        let r = RandomFormula::intercept_only();
        assert!(r.intercept);
        assert!(r.terms.is_empty());
    }

    #[test]
    fn test_random_formula_empty_rejected() {
        assert!(RandomFormula::parse("~ 0").is_err());
        assert!(RandomFormula::parse("~ y ~ x").is_err());
    }
}
