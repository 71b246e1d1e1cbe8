//! # Price Tables
//!
//! $$
//! P \in \mathbb{R}^{T \times N}, \qquad d_0 < d_1 < \dots < d_{T-1}
//! $$
//!
//! Date-indexed price and bid/ask quote tables supplied by the data collaborator.

use std::collections::HashSet;
use std::ops::Range;

use chrono::NaiveDate;
use ndarray::s;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;

use super::returns::ReturnMatrix;
use crate::error::validate_same_length;
use crate::error::Result;
use crate::error::VarToolsError;

fn validate_index(dates: &[NaiveDate], tickers: &[String], shape: (usize, usize)) -> Result<()> {
  if tickers.is_empty() {
    return Err(VarToolsError::InsufficientData(
      "empty asset universe".to_string(),
    ));
  }

  if shape != (dates.len(), tickers.len()) {
    return Err(VarToolsError::InvalidParameter(format!(
      "values have shape {:?}, expected ({}, {})",
      shape,
      dates.len(),
      tickers.len()
    )));
  }

  if let Some(pair) = dates.windows(2).find(|pair| pair[0] >= pair[1]) {
    return Err(VarToolsError::InvalidParameter(format!(
      "dates must be strictly ascending, found {} followed by {}",
      pair[0], pair[1]
    )));
  }

  let mut seen = HashSet::with_capacity(tickers.len());
  if let Some(dup) = tickers.iter().find(|t| !seen.insert(t.as_str())) {
    return Err(VarToolsError::InvalidParameter(format!(
      "duplicate ticker {dup}"
    )));
  }

  Ok(())
}

fn column_indices<S: AsRef<str>>(available: &[String], wanted: &[S]) -> Result<Vec<usize>> {
  if wanted.is_empty() {
    return Err(VarToolsError::InsufficientData(
      "empty asset universe".to_string(),
    ));
  }

  wanted
    .iter()
    .map(|name| {
      let name = name.as_ref();
      available
        .iter()
        .position(|t| t == name)
        .ok_or_else(|| VarToolsError::InvalidParameter(format!("unknown ticker {name}")))
    })
    .collect()
}

/// Asset prices, one column per ticker, rows in ascending date order.
///
/// Missing prices are encoded as `NaN`.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceTable {
  dates: Vec<NaiveDate>,
  tickers: Vec<String>,
  values: Array2<f64>,
}

impl PriceTable {
  pub fn new(dates: Vec<NaiveDate>, tickers: Vec<String>, values: Array2<f64>) -> Result<Self> {
    validate_index(&dates, &tickers, values.dim())?;
    Ok(Self {
      dates,
      tickers,
      values,
    })
  }

  /// Build a table from named price columns of equal length.
  pub fn from_columns<S: Into<String>>(
    dates: Vec<NaiveDate>,
    columns: Vec<(S, Vec<f64>)>,
  ) -> Result<Self> {
    let n_rows = dates.len();
    let mut tickers = Vec::with_capacity(columns.len());
    let mut values = Array2::<f64>::zeros((n_rows, columns.len()));

    for (j, (name, column)) in columns.into_iter().enumerate() {
      let name = name.into();
      validate_same_length(n_rows, column.len(), &format!("price column {name}"))?;
      values.column_mut(j).assign(&Array1::from(column));
      tickers.push(name);
    }

    Self::new(dates, tickers, values)
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn values(&self) -> &Array2<f64> {
    &self.values
  }

  /// Number of rows (trading days).
  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }

  pub fn n_assets(&self) -> usize {
    self.tickers.len()
  }

  pub fn column(&self, ticker: &str) -> Option<ArrayView1<'_, f64>> {
    self
      .tickers
      .iter()
      .position(|t| t == ticker)
      .map(|j| self.values.column(j))
  }

  /// Keep only `tickers`, in the given order.
  pub fn select<S: AsRef<str>>(&self, tickers: &[S]) -> Result<Self> {
    let idx = column_indices(&self.tickers, tickers)?;
    Self::new(
      self.dates.clone(),
      idx.iter().map(|&j| self.tickers[j].clone()).collect(),
      self.values.select(Axis(1), &idx),
    )
  }

  /// Positional row slice; the range is clamped to the table length.
  pub fn slice_rows(&self, range: Range<usize>) -> Self {
    let end = range.end.min(self.len());
    let start = range.start.min(end);
    Self {
      dates: self.dates[start..end].to_vec(),
      tickers: self.tickers.clone(),
      values: self.values.slice(s![start..end, ..]).to_owned(),
    }
  }

  pub fn last_row(&self) -> Result<Array1<f64>> {
    if self.is_empty() {
      return Err(VarToolsError::InsufficientData(
        "price table has no rows".to_string(),
      ));
    }
    Ok(self.values.row(self.len() - 1).to_owned())
  }

  /// Simple returns; rows with any missing value are dropped.
  pub fn returns(&self) -> Result<ReturnMatrix> {
    ReturnMatrix::from_prices(self)
  }

  /// Per-row value of holding `positions` units of every column.
  pub fn position_values(&self, positions: &[f64]) -> Result<Array1<f64>> {
    validate_same_length(self.n_assets(), positions.len(), "positions")?;
    Ok(self.values.dot(&Array1::from(positions.to_vec())))
  }

  /// Single-column view as `(date, price)` pairs, used for benchmarks.
  pub(crate) fn single_series(&self) -> Result<Vec<(NaiveDate, f64)>> {
    if self.n_assets() != 1 {
      return Err(VarToolsError::InvalidParameter(format!(
        "benchmark table must have exactly one column, got {}",
        self.n_assets()
      )));
    }
    Ok(
      self
        .dates
        .iter()
        .copied()
        .zip(self.values.column(0).iter().copied())
        .collect(),
    )
  }
}

/// Bid and ask quotes for the same dates and instruments.
#[derive(Clone, Debug, PartialEq)]
pub struct BidAskTable {
  dates: Vec<NaiveDate>,
  tickers: Vec<String>,
  bids: Array2<f64>,
  asks: Array2<f64>,
}

impl BidAskTable {
  pub fn new(
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    bids: Array2<f64>,
    asks: Array2<f64>,
  ) -> Result<Self> {
    validate_index(&dates, &tickers, bids.dim())?;
    validate_index(&dates, &tickers, asks.dim())?;
    Ok(Self {
      dates,
      tickers,
      bids,
      asks,
    })
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn n_assets(&self) -> usize {
    self.tickers.len()
  }

  /// Mid quotes `(bid + ask) / 2` as a price table.
  pub fn mids(&self) -> Result<PriceTable> {
    PriceTable::new(
      self.dates.clone(),
      self.tickers.clone(),
      (&self.bids + &self.asks) / 2.0,
    )
  }

  /// Relative spreads `(ask - bid) / mid`, one column per instrument.
  pub fn relative_spreads(&self) -> Array2<f64> {
    let mids = (&self.bids + &self.asks) / 2.0;
    (&self.asks - &self.bids) / &mids
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn dates(n: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    (0..n).map(|i| start + chrono::Days::new(i as u64)).collect()
  }

  #[test]
  fn rejects_unsorted_dates() {
    let mut d = dates(3);
    d.swap(0, 1);
    let res = PriceTable::from_columns(d, vec![("A", vec![1.0, 2.0, 3.0])]);
    assert!(matches!(res, Err(VarToolsError::InvalidParameter(_))));
  }

  #[test]
  fn rejects_empty_universe_and_duplicates() {
    let res = PriceTable::new(dates(2), vec![], Array2::zeros((2, 0)));
    assert!(matches!(res, Err(VarToolsError::InsufficientData(_))));

    let res = PriceTable::from_columns(dates(2), vec![("A", vec![1.0, 2.0]), ("A", vec![1.0, 2.0])]);
    assert!(matches!(res, Err(VarToolsError::InvalidParameter(_))));
  }

  #[test]
  fn select_reorders_columns() {
    let table = PriceTable::from_columns(
      dates(2),
      vec![("A", vec![1.0, 2.0]), ("B", vec![10.0, 20.0])],
    )
    .unwrap();

    let picked = table.select(&["B", "A"]).unwrap();
    assert_eq!(picked.tickers(), &["B".to_string(), "A".to_string()]);
    assert_eq!(picked.values()[[1, 0]], 20.0);
    assert!(table.select(&["C"]).is_err());
  }

  #[test]
  fn slice_rows_clamps_range() {
    let table = PriceTable::from_columns(dates(4), vec![("A", vec![1.0, 2.0, 3.0, 4.0])]).unwrap();
    let tail = table.slice_rows(2..10);
    assert_eq!(tail.len(), 2);
    assert_eq!(tail.values()[[0, 0]], 3.0);
    assert!(table.slice_rows(7..9).is_empty());
  }

  #[test]
  fn bid_ask_mids_and_spreads() {
    let quotes = BidAskTable::new(
      dates(2),
      vec!["EURUSD".to_string()],
      Array2::from_shape_vec((2, 1), vec![0.99, 1.09]).unwrap(),
      Array2::from_shape_vec((2, 1), vec![1.01, 1.11]).unwrap(),
    )
    .unwrap();

    let mids = quotes.mids().unwrap();
    assert!((mids.values()[[0, 0]] - 1.0).abs() < 1e-12);
    let spreads = quotes.relative_spreads();
    assert!((spreads[[0, 0]] - 0.02).abs() < 1e-12);
  }
}
