//! Shared fixtures for relay integration tests.

#![allow(dead_code)]

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use relay_engine::chain::{
    CallRequest, ChainError, ChainFees, ChainReceipt, ChainResult, ChainRpc, RelayerIdentity,
};
use relay_engine::config::RelayConfig;
use relay_engine::relay::{Clock, ManualClock, RelayEngine};

/// Anvil's first development account.
pub const ANVIL_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const CHAIN_ID: u64 = 31337;
pub const START_NONCE: u64 = 7;

/// What the mock does with the next broadcast.
#[derive(Debug, Clone)]
pub enum SendScript {
    Accept,
    Reject(String),
    /// Transport failure; the node never saw the transaction.
    NetworkError,
    /// The node took the transaction but the response was lost.
    LostResponse,
}

/// When accepted transactions get a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mining {
    /// Mined in a new block as soon as it is accepted.
    Instant { success: bool },
    /// Only through [`MockChain::include`].
    Manual,
}

/// One decoded `send_raw_transaction` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub tx_hash: TxHash,
    pub nonce: u64,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub to: Option<Address>,
    pub input: Bytes,
    pub value: U256,
    pub accepted: bool,
}

#[derive(Debug)]
struct State {
    fees: ChainFees,
    fee_failures: VecDeque<ChainError>,
    estimate: ChainResult<u64>,
    estimate_failures: VecDeque<ChainError>,
    estimate_calls: u32,
    chain_nonce: u64,
    sends: VecDeque<SendScript>,
    broadcasts: Vec<Broadcast>,
    mining: Mining,
    head: u64,
    advance_head_on_poll: bool,
    receipts: HashMap<TxHash, ChainReceipt>,
    balance: U256,
}

/// Scripted in-memory chain.
#[derive(Debug)]
pub struct MockChain {
    state: Mutex<State>,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                fees: ChainFees {
                    base_fee_per_gas: 10,
                    max_priority_fee_per_gas: 1,
                },
                fee_failures: VecDeque::new(),
                estimate: Ok(21_000),
                estimate_failures: VecDeque::new(),
                estimate_calls: 0,
                chain_nonce: START_NONCE,
                sends: VecDeque::new(),
                broadcasts: Vec::new(),
                mining: Mining::Instant { success: true },
                head: 100,
                advance_head_on_poll: false,
                receipts: HashMap::new(),
                balance: U256::from(10u64).pow(U256::from(18u64)),
            }),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn set_fees(&self, base: u128, priority: u128) {
        self.state().fees = ChainFees {
            base_fee_per_gas: base,
            max_priority_fee_per_gas: priority,
        };
    }

    pub fn fail_fee_queries(&self, errors: impl IntoIterator<Item = ChainError>) {
        self.state().fee_failures.extend(errors);
    }

    pub fn set_estimate(&self, estimate: ChainResult<u64>) {
        self.state().estimate = estimate;
    }

    pub fn fail_estimates(&self, errors: impl IntoIterator<Item = ChainError>) {
        self.state().estimate_failures.extend(errors);
    }

    pub fn estimate_calls(&self) -> u32 {
        self.state().estimate_calls
    }

    /// Queue broadcast behaviors; once drained, broadcasts are accepted.
    pub fn script_sends(&self, sends: impl IntoIterator<Item = SendScript>) {
        self.state().sends.extend(sends);
    }

    pub fn set_mining(&self, mining: Mining) {
        self.state().mining = mining;
    }

    pub fn advance_head_on_poll(&self) {
        self.state().advance_head_on_poll = true;
    }

    pub fn head(&self) -> u64 {
        self.state().head
    }

    pub fn broadcasts(&self) -> Vec<Broadcast> {
        self.state().broadcasts.clone()
    }

    pub fn accepted(&self) -> Vec<Broadcast> {
        self.broadcasts().into_iter().filter(|b| b.accepted).collect()
    }

    /// Mine `tx_hash` in a new block.
    pub fn include(&self, tx_hash: TxHash, success: bool) {
        let mut state = self.state();
        mine(&mut state, tx_hash, success);
    }

    /// Drop a receipt, as a reorg would.
    pub fn reorg_out(&self, tx_hash: TxHash) {
        self.state().receipts.remove(&tx_hash);
    }
}

fn mine(state: &mut State, tx_hash: TxHash, success: bool) {
    let Some(broadcast) = state.broadcasts.iter().find(|b| b.tx_hash == tx_hash).cloned() else {
        return;
    };
    state.head += 1;
    let price = (state.fees.base_fee_per_gas + broadcast.max_priority_fee_per_gas)
        .min(broadcast.max_fee_per_gas);
    state.receipts.insert(
        tx_hash,
        ChainReceipt {
            tx_hash,
            block_number: Some(state.head),
            gas_used: 21_000,
            effective_gas_price: price,
            success,
        },
    );
}

fn decode(raw: &Bytes) -> Broadcast {
    let envelope = TxEnvelope::decode_2718(&mut raw.as_ref()).expect("valid EIP-2718 envelope");
    let tx_hash = *envelope.tx_hash();
    let signed = envelope.as_eip1559().expect("EIP-1559 transaction");
    let tx = signed.tx();
    Broadcast {
        tx_hash,
        nonce: tx.nonce,
        gas_limit: tx.gas_limit,
        max_fee_per_gas: tx.max_fee_per_gas,
        max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
        to: tx.to(),
        input: tx.input.clone(),
        value: tx.value,
        accepted: false,
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn chain_id(&self) -> ChainResult<u64> {
        Ok(CHAIN_ID)
    }

    async fn fee_data(&self) -> ChainResult<ChainFees> {
        let mut state = self.state();
        match state.fee_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(state.fees),
        }
    }

    async fn estimate_gas(&self, _call: &CallRequest) -> ChainResult<u64> {
        let mut state = self.state();
        state.estimate_calls += 1;
        match state.estimate_failures.pop_front() {
            Some(error) => Err(error),
            None => state.estimate.clone(),
        }
    }

    async fn transaction_count(&self, _address: Address) -> ChainResult<u64> {
        Ok(self.state().chain_nonce)
    }

    async fn block_number(&self) -> ChainResult<u64> {
        let mut state = self.state();
        if state.advance_head_on_poll {
            state.head += 1;
        }
        Ok(state.head)
    }

    async fn receipt(&self, tx_hash: TxHash) -> ChainResult<Option<ChainReceipt>> {
        Ok(self.state().receipts.get(&tx_hash).cloned())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> ChainResult<TxHash> {
        let mut broadcast = decode(&raw);
        let mut state = self.state();
        let behavior = state.sends.pop_front().unwrap_or(SendScript::Accept);

        let accepted = matches!(behavior, SendScript::Accept | SendScript::LostResponse);
        broadcast.accepted = accepted;
        let tx_hash = broadcast.tx_hash;
        let nonce = broadcast.nonce;
        state.broadcasts.push(broadcast);

        if accepted {
            if nonce == state.chain_nonce {
                state.chain_nonce += 1;
            }
            if let Mining::Instant { success } = state.mining {
                mine(&mut state, tx_hash, success);
            }
        }

        match behavior {
            SendScript::Accept => Ok(tx_hash),
            SendScript::Reject(reason) => Err(ChainError::Rejected(reason)),
            SendScript::NetworkError | SendScript::LostResponse => {
                Err(ChainError::Rpc("connection reset by peer".to_string()))
            }
        }
    }

    async fn balance(&self, _address: Address) -> ChainResult<U256> {
        Ok(self.state().balance)
    }
}

/// Defaults with a concurrent sequencer; individual tests adjust.
pub fn test_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.nonce.concurrent = true;
    config
}

pub fn identity() -> RelayerIdentity {
    RelayerIdentity::from_private_key(ANVIL_KEY, CHAIN_ID).unwrap()
}

pub fn beef() -> Address {
    "0x000000000000000000000000000000000000beef".parse().unwrap()
}

/// An engine over `chain` driven by a manual clock.
pub async fn engine(chain: &Arc<MockChain>, config: &RelayConfig) -> (RelayEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let rpc: Arc<dyn ChainRpc> = chain.clone();
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let engine = RelayEngine::new(config, rpc, identity(), dyn_clock)
        .await
        .unwrap();
    (engine, clock)
}
