use super::{date_text, opt_int, opt_real, parse_date, real, ChurnStore};
use crate::{
    error::{PipelineError, PipelineResult},
    snapshot::{Card, Channel, Customer, Snapshot, Transaction},
};
use rusqlite::{params, types::Value};

impl ChurnStore {
    // ── Raw snapshot ──────────────────────────────────────────────

    pub fn insert_customer(&self, c: &Customer) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO customer (customer_id, gender, city, age, income, signup_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                c.customer_id,
                c.gender,
                c.city,
                c.age as i64,
                c.income,
                date_text(c.signup_date)
            ],
        )?;
        Ok(())
    }

    pub fn insert_card(&self, card: &Card) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO card (customer_id, credit_limit, current_balance, credit_score)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                card.customer_id,
                card.credit_limit,
                card.current_balance,
                card.credit_score
            ],
        )?;
        Ok(())
    }

    pub fn insert_transaction(&self, t: &Transaction) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO transactions (
                transaction_id, customer_id, transaction_date, amount, merchant_category, channel
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                t.transaction_id,
                t.customer_id,
                date_text(t.transaction_date),
                t.amount,
                t.merchant_category,
                t.channel.as_str()
            ],
        )?;
        Ok(())
    }

    /// Swap the raw tables for `snapshot` atomically.
    pub fn replace_snapshot(&self, snapshot: &Snapshot) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM transactions;
             DELETE FROM card;
             DELETE FROM customer;",
        )?;
        for c in &snapshot.customers {
            self.insert_customer(c)?;
        }
        for card in &snapshot.cards {
            self.insert_card(card)?;
        }
        for t in &snapshot.transactions {
            self.insert_transaction(t)?;
        }
        tx.commit()?;
        log::info!(
            "store: loaded snapshot ({} customers, {} cards, {} transactions)",
            snapshot.customers.len(),
            snapshot.cards.len(),
            snapshot.transactions.len(),
        );
        Ok(())
    }

    pub fn customer_count(&self) -> PipelineResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM customer", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Read the whole raw snapshot. Malformed dates, non-numeric figures and
    /// unknown channels abort the load.
    pub fn load_snapshot(&self) -> PipelineResult<Snapshot> {
        Ok(Snapshot {
            customers:    self.load_customers()?,
            cards:        self.load_cards()?,
            transactions: self.load_transactions()?,
        })
    }

    fn load_customers(&self) -> PipelineResult<Vec<Customer>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, gender, city, age, income, signup_date
             FROM customer ORDER BY customer_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Value>(3)?,
                    row.get::<_, Value>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(customer_id, gender, city, age, income, signup)| {
                let age = opt_int("customer", &customer_id, "age", age)?
                    .and_then(|a| u32::try_from(a).ok())
                    .ok_or_else(|| PipelineError::invalid("customer", &customer_id, "age must be a non-negative integer"))?;
                Ok(Customer {
                    income: real("customer", &customer_id, "income", income)?,
                    signup_date: parse_date("customer", &customer_id, "signup_date", &signup)?,
                    customer_id,
                    gender,
                    city,
                    age,
                })
            })
            .collect()
    }

    fn load_cards(&self) -> PipelineResult<Vec<Card>> {
        let mut stmt = self.conn.prepare(
            "SELECT card_id, customer_id, credit_limit, current_balance, credit_score
             FROM card ORDER BY card_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Value>(2)?,
                    row.get::<_, Value>(3)?,
                    row.get::<_, Value>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(card_id, customer_id, limit, balance, score)| {
                let id = card_id.to_string();
                let credit_score = opt_int("card", &id, "credit_score", score)?
                    .map(|s| {
                        i32::try_from(s).map_err(|_| {
                            PipelineError::invalid("card", &id, format!("credit_score {s} out of range"))
                        })
                    })
                    .transpose()?;
                Ok(Card {
                    credit_limit: opt_real("card", &id, "credit_limit", limit)?,
                    current_balance: opt_real("card", &id, "current_balance", balance)?,
                    credit_score,
                    customer_id,
                })
            })
            .collect()
    }

    fn load_transactions(&self) -> PipelineResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT transaction_id, customer_id, transaction_date, amount,
                    merchant_category, channel
             FROM transactions ORDER BY transaction_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Value>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(transaction_id, customer_id, date, amount, merchant_category, channel)| {
                let channel: Channel = channel
                    .parse()
                    .map_err(|e: String| PipelineError::invalid("transaction", &transaction_id, e))?;
                Ok(Transaction {
                    transaction_date: parse_date("transaction", &transaction_id, "transaction_date", &date)?,
                    amount: real("transaction", &transaction_id, "amount", amount)?,
                    transaction_id,
                    customer_id,
                    merchant_category,
                    channel,
                })
            })
            .collect()
    }
}
