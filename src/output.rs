//! Text and JSON rendering for the CLI.

use color_eyre::Result;
use serde::Serialize;
use serde_json::json;
use std::fmt::Display;

use winkel::entity::{Customer, Entity};
use winkel::store::BackingStore;
use winkel::sync::{Outcome, SyncResult};
use winkel::{DisconnectedCache, Record};

pub struct Output {
  json: bool,
}

impl Output {
  pub fn new(json: bool) -> Self {
    Self { json }
  }

  pub fn message(&self, text: impl Display) {
    if !self.json {
      println!("{}", text);
    }
  }

  fn print_json(&self, value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
  }

  pub fn entity<E: Entity + Serialize + Display>(&self, record: &Record) -> Result<()> {
    let entity = E::from_record(record)?;
    if self.json {
      self.print_json(&entity)
    } else {
      println!("{}", entity);
      Ok(())
    }
  }

  pub fn entities<E: Entity + Serialize + Display>(&self, title: &str, records: &[Record]) -> Result<()> {
    let entities = records
      .iter()
      .map(E::from_record)
      .collect::<Result<Vec<_>, _>>()?;

    if self.json {
      return self.print_json(&json!({ title: entities }));
    }

    println!("{} ({})", title, entities.len());
    for entity in &entities {
      println!("  {}", entity);
    }
    Ok(())
  }

  /// Both sides of a cache: buffered rows with their state, then the store.
  pub fn views<S: BackingStore>(&self, cache: &DisconnectedCache<S>) -> Result<()> {
    let cached = cache.view_cache_only();
    let stored = cache.view_store_only()?;

    if self.json {
      let cached = cached
        .iter()
        .map(|r| -> Result<serde_json::Value> {
          Ok(json!({
            "state": cache.row_state(r.key()),
            "customer": Customer::from_record(r)?,
          }))
        })
        .collect::<Result<Vec<_>>>()?;
      let stored = stored
        .iter()
        .map(Customer::from_record)
        .collect::<Result<Vec<_>, _>>()?;
      return self.print_json(&json!({ "cache": cached, "store": stored }));
    }

    println!("Cache view ({} rows, {} pending)", cached.len(), cache.pending_count());
    for record in &cached {
      let state = cache
        .row_state(record.key())
        .map(|s| s.to_string())
        .unwrap_or_default();
      println!("  {:<9} {}", state, Customer::from_record(record)?);
    }
    println!("Store view ({} rows)", stored.len());
    for record in &stored {
      println!("  {:<9} {}", "", Customer::from_record(record)?);
    }
    Ok(())
  }

  pub fn sync_result(&self, result: &SyncResult) -> Result<()> {
    if self.json {
      return self.print_json(result);
    }

    println!(
      "Synchronized {} row(s) in {} ms: {} applied, {} failed, {} skipped",
      result.rows.len(),
      (result.finished_at - result.started_at).num_milliseconds(),
      result.applied(),
      result.failed().count(),
      result.skipped().count()
    );
    for row in &result.rows {
      let outcome = match &row.outcome {
        Outcome::Applied => "applied".to_string(),
        Outcome::Skipped { reason } => format!("skipped: {}", reason),
        Outcome::Failed { kind, reason } => format!("failed ({:?}): {}", kind, reason),
      };
      println!("  {:<9} {} {}", row.change.to_string(), row.key, outcome);
    }
    Ok(())
  }
}
