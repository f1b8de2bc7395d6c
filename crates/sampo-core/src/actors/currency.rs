//! Currency award actor.
//!
//! The award watermark is written before the balance. A crash between the
//! two writes loses that award instead of paying it twice.

use chrono::{DateTime, Utc};
use sampo_progression::CurrencyAwardEngine;
use sampo_store::{KeyValueStore, Persistence, ProgressStore};
use sampo_types::{AwardEvent, Currency, Wallet};
use tokio::sync::{broadcast, oneshot};

use super::{Actor, publish, respond};

/// Result of evaluating a cumulative total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyOutcome {
    /// The award made, if a new unit was crossed.
    pub award: Option<AwardEvent>,
    /// Balances after the evaluation.
    pub wallet: Wallet,
    /// [`Persistence::Skipped`] unless an award was made.
    pub persistence: Persistence,
}

/// Result of a direct wallet change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletUpdate {
    /// Balances after the change.
    pub wallet: Wallet,
    /// Whether the balances reached durable storage.
    pub persistence: Persistence,
}

/// Commands accepted by the currency actor.
#[derive(Debug)]
pub enum CurrencyCommand {
    /// Pay for any newly crossed units.
    Evaluate {
        /// Canonical cumulative step total.
        total_steps: u64,
        /// Award timestamp.
        now: DateTime<Utc>,
        /// Reply channel.
        reply: oneshot::Sender<CurrencyOutcome>,
    },
    /// Add to a balance.
    Credit {
        /// Currency to credit.
        currency: Currency,
        /// Amount to add.
        amount: u64,
        /// Reply channel.
        reply: oneshot::Sender<WalletUpdate>,
    },
    /// Read balances.
    GetWallet {
        /// Reply channel.
        reply: oneshot::Sender<Wallet>,
    },
    /// Zero the award watermark after a compound reset, writing the zero
    /// again. Balances are kept.
    Reset {
        /// Reply channel.
        reply: oneshot::Sender<Persistence>,
    },
    /// Empty both balances.
    ResetCurrencies {
        /// Reply channel.
        reply: oneshot::Sender<WalletUpdate>,
    },
}

/// Owns the [`CurrencyAwardEngine`].
pub struct CurrencyActor<S> {
    engine: CurrencyAwardEngine,
    store: ProgressStore<S>,
    awards: broadcast::Sender<AwardEvent>,
    wallet_events: broadcast::Sender<Wallet>,
}

impl<S: KeyValueStore> CurrencyActor<S> {
    /// Wrap an engine.
    pub const fn new(
        engine: CurrencyAwardEngine,
        store: ProgressStore<S>,
        awards: broadcast::Sender<AwardEvent>,
        wallet_events: broadcast::Sender<Wallet>,
    ) -> Self {
        Self {
            engine,
            store,
            awards,
            wallet_events,
        }
    }

    async fn save_wallet(&self) -> Persistence {
        let wallet = self.engine.wallet();
        Persistence::from_result("wallet", self.store.save_wallet(&wallet).await)
    }

    async fn wallet_changed(&self) -> WalletUpdate {
        let wallet = self.engine.wallet();
        publish(&self.wallet_events, wallet);
        WalletUpdate {
            wallet,
            persistence: self.save_wallet().await,
        }
    }
}

impl<S: KeyValueStore> Actor for CurrencyActor<S> {
    type Command = CurrencyCommand;
    const NAME: &'static str = "currency";

    async fn handle(&mut self, command: CurrencyCommand) {
        match command {
            CurrencyCommand::Evaluate {
                total_steps,
                now,
                reply,
            } => {
                let award = self.engine.evaluate(total_steps, now);
                let persistence = match award {
                    Some(event) => {
                        publish(&self.awards, event);
                        publish(&self.wallet_events, self.engine.wallet());
                        let result = match self.store.save_currency(self.engine.state()).await {
                            Ok(()) => self.store.save_wallet(&self.engine.wallet()).await,
                            Err(e) => Err(e),
                        };
                        Persistence::from_result("currency", result)
                    }
                    None => Persistence::Skipped,
                };
                respond(
                    reply,
                    CurrencyOutcome {
                        award,
                        wallet: self.engine.wallet(),
                        persistence,
                    },
                );
            }
            CurrencyCommand::Credit {
                currency,
                amount,
                reply,
            } => {
                self.engine.credit(currency, amount);
                respond(reply, self.wallet_changed().await);
            }
            CurrencyCommand::GetWallet { reply } => respond(reply, self.engine.wallet()),
            CurrencyCommand::Reset { reply } => {
                self.engine.reset();
                let persistence = Persistence::from_result(
                    "currency",
                    self.store.save_currency(self.engine.state()).await,
                );
                respond(reply, persistence);
            }
            CurrencyCommand::ResetCurrencies { reply } => {
                self.engine.reset_currencies();
                tracing::info!("wallet emptied");
                respond(reply, self.wallet_changed().await);
            }
        }
    }
}
