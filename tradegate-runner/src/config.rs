//! TOML backtest configuration.
//!
//! ```toml
//! [backtest]
//! symbol = "BTC"
//! market = "crypto"
//! timeframe = "1h"
//! strategy = "auto"          # or momentum | meanrev | turtle_crypto | turtle_stocks
//! start = "2025-01-01"       # optional, inclusive
//! end = "2025-06-30"         # optional, inclusive
//!
//! [sizing]
//! risk_pct = 0.01
//!
//! [simulator]
//! starting_cash = 1000000
//! cooldown_bars = 2
//!
//! [fees]
//! crypto = 0.004
//!
//! [risk]
//! enabled = true
//! circuit_breaker_losses = 3
//!
//! [strategy.turtle_crypto]
//! entry_period = 15
//! ```
//!
//! Every field is optional; omitted fields take the engine defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradegate_core::domain::{Market, Timeframe};
use tradegate_core::regime::RegimeThresholds;
use tradegate_core::risk::RiskLimits;
use tradegate_core::simulator::{FeeSchedule, PyramidStopPolicy, SimulatorConfig};
use tradegate_core::sizing::RiskBudgetSizer;
use tradegate_core::strategy::{StrategyError, StrategyKind, StrategyParams};

/// Content hash of a [`BacktestConfig`].
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(String),
    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Fixed strategy or regime-driven switching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StrategySelection {
    /// Reclassify the regime on a fixed cadence and switch strategies.
    #[default]
    Auto,
    Fixed(StrategyKind),
}

impl StrategySelection {
    pub fn name(&self) -> &'static str {
        match self {
            StrategySelection::Auto => "auto",
            StrategySelection::Fixed(kind) => kind.name(),
        }
    }
}

impl FromStr for StrategySelection {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(StrategySelection::Auto);
        }
        s.parse().map(StrategySelection::Fixed)
    }
}

impl TryFrom<String> for StrategySelection {
    type Error = StrategyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StrategySelection> for String {
    fn from(value: StrategySelection) -> Self {
        value.name().to_string()
    }
}

/// `[backtest]`: what to run and over which data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub symbol: String,
    pub market: Market,
    pub timeframe: Timeframe,
    pub strategy: StrategySelection,
    /// Bars skipped before the first evaluation.
    pub warmup_bars: usize,
    /// Bars required after warm-up for a run to be meaningful.
    pub min_trailing_bars: usize,
    /// Auto mode reclassifies the regime when `bar_index % regime_cadence == 0`.
    pub regime_cadence: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
    /// Directory holding `{SYMBOL}_{timeframe}.csv` files.
    pub data_dir: PathBuf,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            symbol: "BTC".to_string(),
            market: Market::Crypto,
            timeframe: Timeframe::Hour1,
            strategy: StrategySelection::Auto,
            warmup_bars: 30,
            min_trailing_bars: 10,
            regime_cadence: 20,
            start: None,
            end: None,
            data_dir: PathBuf::from("data"),
        }
    }
}

/// `[simulator]`: account and position limits. Fees live in `[fees]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSection {
    pub starting_cash: i64,
    pub max_position_size: i64,
    pub min_position_size: i64,
    pub cooldown_bars: usize,
    pub pyramid_stop: PyramidStopPolicy,
}

impl Default for SimulatorSection {
    fn default() -> Self {
        let defaults = SimulatorConfig::default();
        Self {
            starting_cash: defaults.starting_cash,
            max_position_size: defaults.max_position_size,
            min_position_size: defaults.min_position_size,
            cooldown_bars: defaults.cooldown_bars,
            pyramid_stop: defaults.pyramid_stop,
        }
    }
}

/// `[risk]`: optional Risk Gate in the backtest loop.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSection {
    pub enabled: bool,
    #[serde(flatten)]
    pub limits: RiskLimits,
}

/// Complete configuration for one backtest run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    pub sizing: RiskBudgetSizer,
    pub simulator: SimulatorSection,
    pub fees: FeeSchedule,
    pub risk: RiskSection,
    pub regime: RegimeThresholds,
    pub strategy: StrategyParams,
}

impl BacktestConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: BacktestConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Simulator settings with the `[fees]` schedule folded in.
    pub fn simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            starting_cash: self.simulator.starting_cash,
            max_position_size: self.simulator.max_position_size,
            min_position_size: self.simulator.min_position_size,
            cooldown_bars: self.simulator.cooldown_bars,
            fees: self.fees.clone(),
            pyramid_stop: self.simulator.pyramid_stop,
        }
    }

    /// BLAKE3 over the JSON form. Identical configs share an id.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_vec(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bt = &self.backtest;
        if bt.symbol.trim().is_empty() {
            return Err(ConfigError::invalid("backtest.symbol", "must not be empty"));
        }
        if bt.warmup_bars == 0 {
            return Err(ConfigError::invalid("backtest.warmup_bars", "must be at least 1"));
        }
        if bt.regime_cadence == 0 {
            return Err(ConfigError::invalid("backtest.regime_cadence", "must be at least 1"));
        }
        if let (Some(start), Some(end)) = (bt.start, bt.end) {
            if start > end {
                return Err(ConfigError::invalid(
                    "backtest.start",
                    format!("{start} is after end {end}"),
                ));
            }
        }

        let sim = &self.simulator;
        if sim.starting_cash <= 0 {
            return Err(ConfigError::invalid("simulator.starting_cash", "must be positive"));
        }
        if sim.min_position_size <= 0 || sim.min_position_size > sim.max_position_size {
            return Err(ConfigError::invalid(
                "simulator.min_position_size",
                format!(
                    "must be positive and at most max_position_size ({})",
                    sim.max_position_size
                ),
            ));
        }

        let sizing = &self.sizing;
        if !(sizing.risk_pct > 0.0 && sizing.risk_pct <= 1.0) {
            return Err(ConfigError::invalid("sizing.risk_pct", "must be in (0, 1]"));
        }
        if sizing.min_position <= 0 || sizing.min_position > sizing.max_position {
            return Err(ConfigError::invalid(
                "sizing.min_position",
                "must be positive and at most max_position",
            ));
        }

        for (field, rate) in [
            ("fees.crypto", self.fees.crypto),
            ("fees.asx", self.fees.asx),
            ("fees.us", self.fees.us),
        ] {
            if !(0.0..0.5).contains(&rate) {
                return Err(ConfigError::invalid(field, format!("{rate} is outside [0, 0.5)")));
            }
        }

        let limits = &self.risk.limits;
        if limits.max_position_size <= 0 {
            return Err(ConfigError::invalid("risk.max_position_size", "must be positive"));
        }
        if limits.max_per_trade_risk_pct <= 0.0 || limits.max_daily_drawdown_pct <= 0.0 {
            return Err(ConfigError::invalid(
                "risk.max_per_trade_risk_pct",
                "risk percentages must be positive",
            ));
        }
        if limits.circuit_breaker_losses == 0 {
            return Err(ConfigError::invalid("risk.circuit_breaker_losses", "must be at least 1"));
        }
        if limits.circuit_breaker_pause_minutes < 0 {
            return Err(ConfigError::invalid(
                "risk.circuit_breaker_pause_minutes",
                "must not be negative",
            ));
        }
        self.validate_indicators()
    }

    /// Indicator periods and multipliers for the classifier, sizer and strategies.
    fn validate_indicators(&self) -> Result<(), ConfigError> {
        let regime = &self.regime;
        require_period("regime.adx_period", regime.adx_period, 1)?;
        require_period("regime.bollinger_period", regime.bollinger_period, 2)?;
        require_positive("regime.bollinger_std", regime.bollinger_std)?;

        require_period("sizing.atr_period", self.sizing.atr_period, 1)?;
        require_positive("sizing.atr_fallback_multiple", self.sizing.atr_fallback_multiple)?;

        let m = &self.strategy.momentum;
        require_period("strategy.momentum.rsi_period", m.rsi_period, 1)?;
        require_period("strategy.momentum.macd_fast", m.macd_fast, 1)?;
        require_period("strategy.momentum.macd_slow", m.macd_slow, 1)?;
        require_period("strategy.momentum.macd_signal", m.macd_signal, 1)?;
        require_period("strategy.momentum.atr_period", m.atr_period, 1)?;
        if m.macd_fast >= m.macd_slow {
            return Err(ConfigError::invalid(
                "strategy.momentum.macd_fast",
                format!("{} must be below macd_slow ({})", m.macd_fast, m.macd_slow),
            ));
        }
        require_positive("strategy.momentum.stop_atr_multiple", m.stop_atr_multiple)?;

        let mr = &self.strategy.meanrev;
        require_period("strategy.meanrev.bb_period", mr.bb_period, 2)?;
        require_period("strategy.meanrev.rsi_period", mr.rsi_period, 1)?;
        require_period("strategy.meanrev.atr_period", mr.atr_period, 1)?;
        require_positive("strategy.meanrev.bb_std", mr.bb_std)?;
        require_positive("strategy.meanrev.stop_atr_multiple", mr.stop_atr_multiple)?;

        for (fields, t) in [
            (TURTLE_CRYPTO_FIELDS, &self.strategy.turtle_crypto),
            (TURTLE_STOCKS_FIELDS, &self.strategy.turtle_stocks),
        ] {
            let [entry, long_entry, exit, atr, stop, step] = fields;
            require_period(entry, t.entry_period, 1)?;
            require_period(long_entry, t.long_entry_period, 1)?;
            require_period(exit, t.exit_period, 1)?;
            require_period(atr, t.atr_period, 1)?;
            require_positive(stop, t.stop_multiplier)?;
            if t.pyramid_atr_step.is_nan() || t.pyramid_atr_step < 0.0 {
                return Err(ConfigError::invalid(step, "must not be negative"));
            }
        }
        Ok(())
    }
}

const TURTLE_CRYPTO_FIELDS: [&str; 6] = [
    "strategy.turtle_crypto.entry_period",
    "strategy.turtle_crypto.long_entry_period",
    "strategy.turtle_crypto.exit_period",
    "strategy.turtle_crypto.atr_period",
    "strategy.turtle_crypto.stop_multiplier",
    "strategy.turtle_crypto.pyramid_atr_step",
];

const TURTLE_STOCKS_FIELDS: [&str; 6] = [
    "strategy.turtle_stocks.entry_period",
    "strategy.turtle_stocks.long_entry_period",
    "strategy.turtle_stocks.exit_period",
    "strategy.turtle_stocks.atr_period",
    "strategy.turtle_stocks.stop_multiplier",
    "strategy.turtle_stocks.pyramid_atr_step",
];

fn require_period(field: &'static str, period: usize, min: usize) -> Result<(), ConfigError> {
    if period < min {
        return Err(ConfigError::invalid(field, format!("must be at least {min}")));
    }
    Ok(())
}

fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_nan() || value <= 0.0 {
        return Err(ConfigError::invalid(field, format!("{value} must be positive")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_the_default() {
        let config = BacktestConfig::from_toml_str("").unwrap();
        assert_eq!(config, BacktestConfig::default());
        assert_eq!(config.backtest.warmup_bars, 30);
        assert_eq!(config.backtest.regime_cadence, 20);
        assert_eq!(config.risk.limits, RiskLimits::default());
        assert!(!config.risk.enabled);
    }

    #[test]
    fn parses_all_sections() {
        let text = r#"
            [backtest]
            symbol = "CBA"
            market = "asx"
            timeframe = "1d"
            strategy = "turtle_stocks"
            start = "2024-01-01"
            end = "2024-12-31"

            [sizing]
            risk_pct = 0.02

            [simulator]
            starting_cash = 5000000
            cooldown_bars = 3
            pyramid_stop = "tighten_only"

            [fees]
            asx = 0.002

            [risk]
            enabled = true
            circuit_breaker_losses = 5

            [strategy.turtle_stocks]
            entry_period = 25
            long_entry_period = 60
            exit_period = 12
            atr_period = 20
            stop_multiplier = 2.0
            pyramid_atr_step = 0.5
            max_pyramids = 4
        "#;
        let config = BacktestConfig::from_toml_str(text).unwrap();
        assert_eq!(config.backtest.market, Market::Asx);
        assert_eq!(config.backtest.timeframe, Timeframe::Day1);
        assert_eq!(
            config.backtest.strategy,
            StrategySelection::Fixed(StrategyKind::TurtleStocks)
        );
        assert_eq!(config.backtest.start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(config.sizing.risk_pct, 0.02);
        assert_eq!(config.sizing.max_position, 10_000);
        assert_eq!(config.simulator.starting_cash, 5_000_000);
        assert_eq!(config.simulator.pyramid_stop, PyramidStopPolicy::TightenOnly);
        assert_eq!(config.fees.asx, 0.002);
        assert_eq!(config.fees.crypto, 0.004);
        assert!(config.risk.enabled);
        assert_eq!(config.risk.limits.circuit_breaker_losses, 5);
        assert_eq!(config.risk.limits.circuit_breaker_pause_minutes, 60);
        assert_eq!(config.strategy.turtle_stocks.entry_period, 25);

        let sim = config.simulator_config();
        assert_eq!(sim.fees.asx, 0.002);
        assert_eq!(sim.cooldown_bars, 3);
    }

    #[test]
    fn unknown_strategy_is_a_parse_error() {
        let err =
            BacktestConfig::from_toml_str("[backtest]\nstrategy = \"scalper\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err}");
    }

    #[test]
    fn toml_round_trip() {
        let mut config = BacktestConfig::default();
        config.backtest.strategy = StrategySelection::Fixed(StrategyKind::MeanReversion);
        config.backtest.start = NaiveDate::from_ymd_opt(2025, 3, 1);
        config.risk.enabled = true;
        let text = config.to_toml_string().unwrap();
        assert_eq!(BacktestConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn run_id_is_deterministic_and_sensitive() {
        let a = BacktestConfig::default();
        let mut b = BacktestConfig::default();
        assert_eq!(a.run_id().unwrap(), b.run_id().unwrap());
        assert_eq!(a.run_id().unwrap().len(), 64);

        b.simulator.cooldown_bars = 1;
        assert_ne!(a.run_id().unwrap(), b.run_id().unwrap());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = BacktestConfig::default();
        config.backtest.regime_cadence = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "backtest.regime_cadence", .. })
        ));

        let mut config = BacktestConfig::default();
        config.backtest.start = NaiveDate::from_ymd_opt(2025, 2, 1);
        config.backtest.end = NaiveDate::from_ymd_opt(2025, 1, 1);
        assert!(config.validate().is_err());

        let mut config = BacktestConfig::default();
        config.simulator.min_position_size = 20_000;
        assert!(config.validate().is_err());

        let mut config = BacktestConfig::default();
        config.fees.crypto = -0.1;
        assert!(config.validate().is_err());

        let mut config = BacktestConfig::default();
        config.sizing.risk_pct = 0.0;
        assert!(config.validate().is_err());
    }

    fn rejected_field(mutate: impl FnOnce(&mut BacktestConfig)) -> &'static str {
        let mut config = BacktestConfig::default();
        mutate(&mut config);
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => field,
            other => panic!("expected an invalid field, got {other:?}"),
        }
    }

    #[test]
    fn defaults_pass_validation() {
        BacktestConfig::default().validate().unwrap();
    }

    #[test]
    fn regime_periods_are_validated() {
        assert_eq!(rejected_field(|c| c.regime.adx_period = 0), "regime.adx_period");
        assert_eq!(rejected_field(|c| c.regime.bollinger_period = 1), "regime.bollinger_period");
        assert_eq!(rejected_field(|c| c.regime.bollinger_std = 0.0), "regime.bollinger_std");
    }

    #[test]
    fn sizing_atr_settings_are_validated() {
        assert_eq!(rejected_field(|c| c.sizing.atr_period = 0), "sizing.atr_period");
        assert_eq!(
            rejected_field(|c| c.sizing.atr_fallback_multiple = f64::NAN),
            "sizing.atr_fallback_multiple"
        );
    }

    #[test]
    fn momentum_params_are_validated() {
        assert_eq!(
            rejected_field(|c| c.strategy.momentum.rsi_period = 0),
            "strategy.momentum.rsi_period"
        );
        assert_eq!(
            rejected_field(|c| c.strategy.momentum.macd_fast = 0),
            "strategy.momentum.macd_fast"
        );
        assert_eq!(
            rejected_field(|c| c.strategy.momentum.macd_slow = 0),
            "strategy.momentum.macd_slow"
        );
        assert_eq!(
            rejected_field(|c| c.strategy.momentum.macd_signal = 0),
            "strategy.momentum.macd_signal"
        );
        assert_eq!(
            rejected_field(|c| c.strategy.momentum.atr_period = 0),
            "strategy.momentum.atr_period"
        );
        assert_eq!(
            rejected_field(|c| {
                c.strategy.momentum.macd_fast = 26;
                c.strategy.momentum.macd_slow = 12;
            }),
            "strategy.momentum.macd_fast"
        );
        assert_eq!(
            rejected_field(|c| c.strategy.momentum.stop_atr_multiple = -1.0),
            "strategy.momentum.stop_atr_multiple"
        );
    }

    #[test]
    fn mean_reversion_params_are_validated() {
        assert_eq!(
            rejected_field(|c| c.strategy.meanrev.bb_period = 1),
            "strategy.meanrev.bb_period"
        );
        assert_eq!(
            rejected_field(|c| c.strategy.meanrev.rsi_period = 0),
            "strategy.meanrev.rsi_period"
        );
        assert_eq!(
            rejected_field(|c| c.strategy.meanrev.atr_period = 0),
            "strategy.meanrev.atr_period"
        );
        assert_eq!(
            rejected_field(|c| c.strategy.meanrev.bb_std = 0.0),
            "strategy.meanrev.bb_std"
        );
        assert_eq!(
            rejected_field(|c| c.strategy.meanrev.stop_atr_multiple = 0.0),
            "strategy.meanrev.stop_atr_multiple"
        );
    }

    #[test]
    fn turtle_params_are_validated_per_market() {
        assert_eq!(
            rejected_field(|c| c.strategy.turtle_crypto.entry_period = 0),
            "strategy.turtle_crypto.entry_period"
        );
        assert_eq!(
            rejected_field(|c| c.strategy.turtle_crypto.long_entry_period = 0),
            "strategy.turtle_crypto.long_entry_period"
        );
        assert_eq!(
            rejected_field(|c| c.strategy.turtle_crypto.exit_period = 0),
            "strategy.turtle_crypto.exit_period"
        );
        assert_eq!(
            rejected_field(|c| c.strategy.turtle_crypto.atr_period = 0),
            "strategy.turtle_crypto.atr_period"
        );
        assert_eq!(
            rejected_field(|c| c.strategy.turtle_crypto.stop_multiplier = 0.0),
            "strategy.turtle_crypto.stop_multiplier"
        );
        assert_eq!(
            rejected_field(|c| c.strategy.turtle_crypto.pyramid_atr_step = -0.5),
            "strategy.turtle_crypto.pyramid_atr_step"
        );
        assert_eq!(
            rejected_field(|c| c.strategy.turtle_stocks.atr_period = 0),
            "strategy.turtle_stocks.atr_period"
        );
        assert_eq!(
            rejected_field(|c| c.strategy.turtle_stocks.stop_multiplier = -2.0),
            "strategy.turtle_stocks.stop_multiplier"
        );
    }

    #[test]
    fn zero_period_in_toml_is_rejected_on_load() {
        let err = BacktestConfig::from_toml_str("[strategy.momentum]\natr_period = 0\n")
            .unwrap_err();
        assert!(
            matches!(
                err,
                ConfigError::Invalid {
                    field: "strategy.momentum.atr_period",
                    ..
                }
            ),
            "{err}"
        );
    }

    #[test]
    fn strategy_selection_parses_case_insensitively() {
        assert_eq!("AUTO".parse::<StrategySelection>().unwrap(), StrategySelection::Auto);
        assert_eq!(
            "meanrev".parse::<StrategySelection>().unwrap(),
            StrategySelection::Fixed(StrategyKind::MeanReversion)
        );
        assert_eq!(String::from(StrategySelection::Auto), "auto");
    }
}
