use crate::analyzer::SurveyFrame;
use crate::models::Score;
use crate::schema::{Hypothesis, SurveySchema};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};
use std::collections::HashMap;
use std::fmt;

/// Statistics computed from one score column
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

pub fn describe(values: &[Score]) -> Option<Summary> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }

    let count = present.len();
    let mean = present.iter().sum::<f64>() / count as f64;
    let min = present.iter().copied().fold(f64::INFINITY, f64::min);
    let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(Summary { count, mean, min, max })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    pub r: f64,
    pub p_value: f64,
    pub n: usize,
}

/// Pearson correlation over rows where both values are present, with a two-sided
/// p-value from Student's t on n - 2 degrees of freedom.
///
/// `None` when fewer than three complete pairs remain or either side is constant.
pub fn pearson(xs: &[Score], ys: &[Score]) -> Option<Correlation> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys.iter())
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();

    let n = pairs.len();
    if n < 3 {
        return None;
    }

    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n as f64;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n as f64;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return None;
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let df = (n - 2) as f64;

    let p_value = if (1.0 - r.abs()) < 1e-12 {
        0.0
    } else {
        let t = r * (df / (1.0 - r * r)).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df).ok()?;
        (2.0 * dist.sf(t.abs())).min(1.0)
    };

    Some(Correlation { r, p_value, n })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Anova {
    pub f_statistic: f64,
    pub p_value: f64,
    pub groups: usize,
    pub observations: usize,
}

/// One-way analysis of variance across groups. Empty groups are ignored.
///
/// `None` when fewer than two groups remain, there are no within-group degrees of
/// freedom, or every observation is identical.
pub fn one_way_anova(groups: &[Vec<f64>]) -> Option<Anova> {
    let groups: Vec<&Vec<f64>> = groups.iter().filter(|g| !g.is_empty()).collect();
    let k = groups.len();
    let n: usize = groups.iter().map(|g| g.len()).sum();

    if k < 2 || n <= k {
        return None;
    }

    let grand_mean = groups.iter().flat_map(|g| g.iter()).sum::<f64>() / n as f64;

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for group in &groups {
        let mean = group.iter().sum::<f64>() / group.len() as f64;
        ss_between += group.len() as f64 * (mean - grand_mean).powi(2);
        ss_within += group.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    }

    let df_between = (k - 1) as f64;
    let df_within = (n - k) as f64;

    if ss_within == 0.0 {
        if ss_between == 0.0 {
            return None;
        }
        return Some(Anova {
            f_statistic: f64::INFINITY,
            p_value: 0.0,
            groups: k,
            observations: n,
        });
    }

    let f_statistic = (ss_between / df_between) / (ss_within / df_within);
    let dist = FisherSnedecor::new(df_between, df_within).ok()?;
    let p_value = dist.sf(f_statistic);

    Some(Anova {
        f_statistic,
        p_value,
        groups: k,
        observations: n,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    Weak,
    Moderate,
    Strong,
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strength::Weak => write!(f, "weak"),
            Strength::Moderate => write!(f, "moderate"),
            Strength::Strong => write!(f, "strong"),
        }
    }
}

/// Bucket by |r|: weak below 0.3, strong above 0.5, moderate in between.
pub fn strength(r: f64) -> Strength {
    let magnitude = r.abs();
    if magnitude > 0.5 {
        Strength::Strong
    } else if magnitude >= 0.3 {
        Strength::Moderate
    } else {
        Strength::Weak
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    CorrelationValidated {
        correlation: Correlation,
        strength: Strength,
        positive: bool,
    },
    CorrelationRejected(Correlation),
    DifferenceValidated(Anova),
    DifferenceRejected(Anova),
    Skipped(String),
}

impl Verdict {
    pub fn is_validated(&self) -> bool {
        matches!(
            self,
            Verdict::CorrelationValidated { .. } | Verdict::DifferenceValidated(_)
        )
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::CorrelationValidated {
                correlation,
                strength,
                positive,
            } => write!(
                f,
                "Significant {} {} correlation (r={:.3}, p={:.4}, n={}). Hypothesis VALIDATED.",
                if *positive { "positive" } else { "negative" },
                strength,
                correlation.r,
                correlation.p_value,
                correlation.n
            ),
            Verdict::CorrelationRejected(c) => write!(
                f,
                "No statistically significant correlation (r={:.3}, p={:.4}, n={}). Hypothesis REJECTED.",
                c.r, c.p_value, c.n
            ),
            Verdict::DifferenceValidated(a) => write!(
                f,
                "Significant ANOVA (F={:.2}, p={:.4}, {} groups). Group means differ. Hypothesis VALIDATED.",
                a.f_statistic, a.p_value, a.groups
            ),
            Verdict::DifferenceRejected(a) => write!(
                f,
                "ANOVA not significant (F={:.2}, p={:.4}, {} groups). Hypothesis REJECTED.",
                a.f_statistic, a.p_value, a.groups
            ),
            Verdict::Skipped(reason) => write!(f, "Skipped: {}", reason),
        }
    }
}

pub fn classify_correlation(correlation: Correlation, alpha: f64) -> Verdict {
    if correlation.p_value < alpha {
        Verdict::CorrelationValidated {
            strength: strength(correlation.r),
            positive: correlation.r > 0.0,
            correlation,
        }
    } else {
        Verdict::CorrelationRejected(correlation)
    }
}

pub fn classify_anova(anova: Anova, alpha: f64) -> Verdict {
    if anova.p_value < alpha {
        Verdict::DifferenceValidated(anova)
    } else {
        Verdict::DifferenceRejected(anova)
    }
}

/// Score values grouped by category, restricted to categories with more than
/// `min_size` respondents. Respondents with a missing score are dropped after
/// the size check. Groups come back sorted by category name.
pub fn grouped_scores(
    values: &[Score],
    categories: &[String],
    min_size: usize,
) -> Vec<(String, Vec<f64>)> {
    let mut by_category: HashMap<&str, (usize, Vec<f64>)> = HashMap::new();
    for (value, category) in values.iter().zip(categories.iter()) {
        if category.is_empty() {
            continue;
        }
        let entry = by_category.entry(category.as_str()).or_default();
        entry.0 += 1;
        if let Some(v) = value {
            entry.1.push(*v);
        }
    }

    let mut groups: Vec<(String, Vec<f64>)> = by_category
        .into_iter()
        .filter(|(_, (count, _))| *count > min_size)
        .map(|(category, (_, values))| (category.to_string(), values))
        .collect();
    groups.sort_by(|a, b| a.0.cmp(&b.0));
    groups
}

#[derive(Debug, Clone, PartialEq)]
pub struct HypothesisResult {
    pub id: String,
    pub title: String,
    pub verdict: Verdict,
}

pub fn evaluate(hypothesis: &Hypothesis, frame: &SurveyFrame, schema: &SurveySchema) -> Verdict {
    let alpha = schema.significance_level;

    match hypothesis {
        Hypothesis::Correlation { x, y, .. } => {
            let (Some(xs), Some(ys)) = (frame.scores(x), frame.scores(y)) else {
                return Verdict::Skipped(format!("score columns '{}' / '{}' not available", x, y));
            };
            match pearson(xs, ys) {
                Some(correlation) => classify_correlation(correlation, alpha),
                None => Verdict::Skipped(
                    "fewer than 3 complete pairs or a constant column".to_string(),
                ),
            }
        }
        Hypothesis::GroupDifference { value, category, .. } => {
            let (Some(values), Some(categories)) = (frame.scores(value), frame.text(category))
            else {
                return Verdict::Skipped(format!(
                    "columns '{}' / '{}' not available",
                    value, category
                ));
            };

            let groups = grouped_scores(values, categories, schema.min_category_size);
            if groups.len() < 2 {
                return Verdict::Skipped(format!(
                    "not enough categories with more than {} respondents for ANOVA",
                    schema.min_category_size
                ));
            }

            let samples: Vec<Vec<f64>> = groups.into_iter().map(|(_, v)| v).collect();
            match one_way_anova(&samples) {
                Some(anova) => classify_anova(anova, alpha),
                None => Verdict::Skipped("groups have no variance to compare".to_string()),
            }
        }
    }
}

pub fn run_hypotheses(frame: &SurveyFrame, schema: &SurveySchema) -> Vec<HypothesisResult> {
    schema
        .hypotheses
        .iter()
        .map(|h| HypothesisResult {
            id: h.id().to_string(),
            title: h.title().to_string(),
            verdict: evaluate(h, frame, schema),
        })
        .collect()
}
