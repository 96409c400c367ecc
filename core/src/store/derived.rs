use super::{date_text, parse_date, ChurnStore};
use crate::{
    aggregator::CustomerSummary,
    error::{PipelineError, PipelineResult},
    labeler::LabeledSummary,
    pipeline::PipelineOutput,
    ranker::{MetricRanks, PercentileScore},
    segmenter::{RiskAssignment, RiskSegment},
    types::Percentile,
    validator::{CalibrationReport, CalibrationRow},
};
use rusqlite::params;

impl ChurnStore {
    // ── Derived outputs ────────────────────────────────────────

    /// Replace every derived table with `output` in one transaction.
    /// Readers never observe a mix of two runs.
    pub fn replace_derived(&self, output: &PipelineOutput) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM customer_summary;
             DELETE FROM percentile_score;
             DELETE FROM risk_score;
             DELETE FROM calibration_report;",
        )?;

        for l in &output.labeled {
            let s = &l.summary;
            tx.execute(
                "INSERT INTO customer_summary (
                    customer_id, active_months, txn_count, total_spend, avg_spend_per_txn,
                    category_count, last_txn_date, credit_score, credit_util_ratio, churn_flag
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    s.customer_id,
                    s.active_months,
                    s.txn_count,
                    s.total_spend,
                    s.avg_spend_per_txn,
                    s.category_count,
                    s.last_txn_date.map(date_text),
                    s.credit_score,
                    s.credit_util_ratio,
                    l.churn_flag,
                ],
            )?;
        }

        for p in &output.percentiles {
            let r = &p.ranks;
            tx.execute(
                "INSERT INTO percentile_score (
                    customer_id, pct_active_months, pct_category_count, pct_utilization,
                    pct_total_spend, pct_credit_score, pct_avg_spend
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    p.customer_id,
                    r.pct_active_months,
                    r.pct_category_count,
                    r.pct_utilization,
                    r.pct_total_spend,
                    r.pct_credit_score,
                    r.pct_avg_spend,
                ],
            )?;
        }

        for a in &output.assignments {
            let pts = &a.rule_points;
            tx.execute(
                "INSERT INTO risk_score (
                    customer_id, risk_score, risk_segment,
                    pts_active_months, pts_category_count, pts_utilization,
                    pts_total_spend, pts_credit_score, pts_avg_spend
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    a.customer_id,
                    a.risk_score,
                    a.segment.as_str(),
                    pts[0],
                    pts[1],
                    pts[2],
                    pts[3],
                    pts[4],
                    pts[5],
                ],
            )?;
        }

        for (order, row) in output.report.rows.iter().enumerate() {
            tx.execute(
                "INSERT INTO calibration_report (
                    segment, segment_order, customer_count, churned_count,
                    unlabeled_count, churn_rate
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    row.segment.as_str(),
                    order as i64,
                    row.customer_count as i64,
                    row.churned_count as i64,
                    row.unlabeled_count as i64,
                    row.churn_rate,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn load_labeled_summaries(&self) -> PipelineResult<Vec<LabeledSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, active_months, txn_count, total_spend, avg_spend_per_txn,
                    category_count, last_txn_date, credit_score, credit_util_ratio, churn_flag
             FROM customer_summary ORDER BY customer_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    CustomerSummary {
                        customer_id:       row.get(0)?,
                        active_months:     row.get(1)?,
                        txn_count:         row.get(2)?,
                        total_spend:       row.get(3)?,
                        avg_spend_per_txn: row.get(4)?,
                        category_count:    row.get(5)?,
                        last_txn_date:     None,
                        credit_score:      row.get(7)?,
                        credit_util_ratio: row.get(8)?,
                    },
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<bool>>(9)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(mut summary, last_txn, churn_flag)| {
                summary.last_txn_date = last_txn
                    .map(|d| parse_date("customer_summary", &summary.customer_id, "last_txn_date", &d))
                    .transpose()?;
                Ok(LabeledSummary { summary, churn_flag })
            })
            .collect()
    }

    pub fn load_percentile_scores(&self) -> PipelineResult<Vec<PercentileScore>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, pct_active_months, pct_category_count, pct_utilization,
                    pct_total_spend, pct_credit_score, pct_avg_spend
             FROM percentile_score ORDER BY customer_id",
        )?;
        let scores = stmt
            .query_map([], |row| {
                Ok(PercentileScore {
                    customer_id: row.get(0)?,
                    ranks: MetricRanks {
                        pct_active_months:  row.get::<_, Option<Percentile>>(1)?,
                        pct_category_count: row.get::<_, Option<Percentile>>(2)?,
                        pct_utilization:    row.get::<_, Option<Percentile>>(3)?,
                        pct_total_spend:    row.get::<_, Option<Percentile>>(4)?,
                        pct_credit_score:   row.get::<_, Option<Percentile>>(5)?,
                        pct_avg_spend:      row.get::<_, Option<Percentile>>(6)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(scores)
    }

    pub fn load_risk_assignments(&self) -> PipelineResult<Vec<RiskAssignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, risk_score, risk_segment,
                    pts_active_months, pts_category_count, pts_utilization,
                    pts_total_spend, pts_credit_score, pts_avg_spend
             FROM risk_score ORDER BY customer_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u8>(1)?,
                    row.get::<_, String>(2)?,
                    [
                        row.get::<_, u8>(3)?,
                        row.get::<_, u8>(4)?,
                        row.get::<_, u8>(5)?,
                        row.get::<_, u8>(6)?,
                        row.get::<_, u8>(7)?,
                        row.get::<_, u8>(8)?,
                    ],
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(customer_id, risk_score, segment, rule_points)| {
                let segment: RiskSegment = segment
                    .parse()
                    .map_err(|e: String| PipelineError::invalid("risk_score", &customer_id, e))?;
                Ok(RiskAssignment { customer_id, risk_score, rule_points, segment })
            })
            .collect()
    }

    pub fn load_calibration_report(&self) -> PipelineResult<CalibrationReport> {
        let mut stmt = self.conn.prepare(
            "SELECT segment, customer_count, churned_count, unlabeled_count, churn_rate
             FROM calibration_report ORDER BY segment_order",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)? as u64,
                    row.get::<_, i64>(2)? as u64,
                    row.get::<_, i64>(3)? as u64,
                    row.get::<_, Option<f64>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let rows = rows
            .into_iter()
            .map(|(segment, customer_count, churned_count, unlabeled_count, churn_rate)| {
                let segment: RiskSegment = segment
                    .parse()
                    .map_err(|e: String| PipelineError::invalid("calibration_report", "-", e))?;
                Ok(CalibrationRow {
                    segment,
                    customer_count,
                    churned_count,
                    unlabeled_count,
                    churn_rate,
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        Ok(CalibrationReport { rows })
    }

    pub fn segment_count(&self, segment: RiskSegment) -> PipelineResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM risk_score WHERE risk_segment = ?1",
                params![segment.as_str()],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }
}
