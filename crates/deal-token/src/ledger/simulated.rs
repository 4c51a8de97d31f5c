//! In-memory ledger for development and tests.
//!
//! Transactions are decoded, signature-checked and executed against a copy of
//! the account table; the copy is committed only if every instruction
//! succeeds. Supported programs: system (create account, transfer), token
//! (initialize mint, mint-to, set authority, transfer, burn) and associated
//! token account creation.

use super::{AccountInfo, ConfirmationStatus, Ledger, SignatureStatus};
use crate::amount::Amount;
use crate::error::{DealError, Result};
use crate::keys::{Address, Blockhash, Signature};
use crate::programs::token::AuthorityType;
use crate::programs::{associated_token, rent_exempt_minimum, system, token};
use crate::state::{MintState, TokenAccountState};
use crate::transaction::{CompiledInstruction, Message, Transaction};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fee charged per required signature.
pub const LAMPORTS_PER_SIGNATURE: u64 = 5000;

/// JSON-RPC code used when a transaction fails preflight.
const SIMULATION_FAILED: i64 = -32002;
/// JSON-RPC code used when signatures do not verify.
const SIGNATURE_FAILURE: i64 = -32003;
/// JSON-RPC code for undecodable input.
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Clone)]
struct Account {
    lamports: u64,
    owner: Address,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<Address, Account>,
    blockhashes: HashSet<Blockhash>,
    blockhash_counter: u64,
    statuses: HashMap<Signature, SignatureStatus>,
    withheld: Vec<Signature>,
    slot: u64,
    submissions: u64,
    fail_sends: u32,
    withhold_confirmations: bool,
}

/// Shared, cloneable in-memory ledger.
///
/// Clones observe the same state, so a test can keep one handle for
/// inspection while another is owned by a connection.
#[derive(Debug, Clone, Default)]
pub struct SimulatedLedger {
    state: Arc<Mutex<State>>,
}

impl SimulatedLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `address`, creating a system account if needed.
    pub fn airdrop(&self, address: &Address, amount: Amount) {
        let mut state = self.state.lock();
        let account = state.accounts.entry(*address).or_insert_with(|| Account {
            lamports: 0,
            owner: system::ID,
            data: Vec::new(),
        });
        account.lamports = account.lamports.saturating_add(amount.lamports());
        info!(address = %address, amount = %amount, "airdrop completed");
    }

    /// Number of `send_raw_transaction` calls received, accepted or not.
    #[must_use]
    pub fn submission_count(&self) -> u64 {
        self.state.lock().submissions
    }

    /// Fail the next `n` sends with a transient network error.
    pub fn fail_next_sends(&self, n: u32) {
        self.state.lock().fail_sends = n;
    }

    /// While set, accepted transactions are executed but their status is not
    /// reported, as if confirmation never arrived.
    pub fn withhold_confirmations(&self, withhold: bool) {
        self.state.lock().withhold_confirmations = withhold;
    }

    /// Report every withheld transaction as confirmed.
    pub fn release_confirmations(&self) {
        let mut state = self.state.lock();
        let slot = state.slot;
        let withheld = std::mem::take(&mut state.withheld);
        for signature in withheld {
            state.statuses.insert(
                signature,
                SignatureStatus {
                    slot,
                    confirmation_status: Some(ConfirmationStatus::Confirmed),
                    err: None,
                },
            );
        }
    }

    fn process(state: &mut State, wire: &[u8]) -> Result<Signature> {
        let tx = Transaction::deserialize(wire).map_err(|e| DealError::Rpc {
            code: INVALID_PARAMS,
            message: format!("failed to deserialize transaction: {e}"),
        })?;
        if !tx.is_fully_signed() || !tx.verify_signatures() {
            return Err(DealError::Rpc {
                code: SIGNATURE_FAILURE,
                message: "Transaction signature verification failure".to_string(),
            });
        }
        let signature = tx.signature().ok_or_else(|| DealError::Rpc {
            code: SIGNATURE_FAILURE,
            message: "missing fee payer signature".to_string(),
        })?;
        if state.statuses.contains_key(&signature) || state.withheld.contains(&signature) {
            return Err(DealError::Rpc {
                code: SIMULATION_FAILED,
                message: "Transaction simulation failed: This transaction has already been processed"
                    .to_string(),
            });
        }
        let message = tx.message();
        if !state.blockhashes.contains(&message.recent_blockhash) {
            return Err(DealError::Rpc {
                code: SIMULATION_FAILED,
                message: "Transaction simulation failed: Blockhash not found".to_string(),
            });
        }

        let mut accounts = state.accounts.clone();
        let fee = LAMPORTS_PER_SIGNATURE * tx.signatures().len() as u64;
        let payer = message.account_keys[0];
        debit(&mut accounts, &payer, fee).map_err(|reason| DealError::Rpc {
            code: SIMULATION_FAILED,
            message: format!("Transaction simulation failed: fee payer {reason}"),
        })?;

        for (index, ix) in message.instructions.iter().enumerate() {
            let ctx = Context { message, ix };
            execute(&mut accounts, &ctx).map_err(|reason| DealError::Rpc {
                code: SIMULATION_FAILED,
                message: format!(
                    "Transaction simulation failed: Error processing Instruction {index}: {reason}"
                ),
            })?;
        }

        state.accounts = accounts;
        state.slot += 1;
        if state.withhold_confirmations {
            state.withheld.push(signature);
        } else {
            let slot = state.slot;
            state.statuses.insert(
                signature,
                SignatureStatus {
                    slot,
                    confirmation_status: Some(ConfirmationStatus::Confirmed),
                    err: None,
                },
            );
        }
        Ok(signature)
    }
}

impl Ledger for SimulatedLedger {
    async fn get_balance(&self, address: &Address) -> Result<Amount> {
        let state = self.state.lock();
        Ok(Amount::from_lamports(
            state.accounts.get(address).map_or(0, |a| a.lamports),
        ))
    }

    async fn get_latest_blockhash(&self) -> Result<Blockhash> {
        let mut state = self.state.lock();
        state.blockhash_counter += 1;
        let digest: [u8; 32] = Sha256::new()
            .chain_update(b"simulated-blockhash")
            .chain_update(state.blockhash_counter.to_le_bytes())
            .finalize()
            .into();
        let blockhash = Blockhash::new(digest);
        state.blockhashes.insert(blockhash);
        Ok(blockhash)
    }

    async fn get_account_info(&self, address: &Address) -> Result<Option<AccountInfo>> {
        let state = self.state.lock();
        Ok(state.accounts.get(address).map(|a| AccountInfo {
            lamports: a.lamports,
            owner: a.owner,
            data: a.data.clone(),
            executable: false,
        }))
    }

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64> {
        Ok(rent_exempt_minimum(data_len))
    }

    async fn send_raw_transaction(&self, wire: &[u8]) -> Result<Signature> {
        let mut state = self.state.lock();
        state.submissions += 1;
        if state.fail_sends > 0 {
            state.fail_sends -= 1;
            warn!(submission = state.submissions, "simulated send failure");
            return Err(DealError::network_error("simulated connection reset"));
        }
        let result = Self::process(&mut state, wire);
        match &result {
            Ok(signature) => debug!(signature = %signature, slot = state.slot, "transaction executed"),
            Err(e) => debug!(error = %e, "transaction rejected"),
        }
        result
    }

    async fn get_signature_status(&self, signature: &Signature) -> Result<Option<SignatureStatus>> {
        Ok(self.state.lock().statuses.get(signature).cloned())
    }
}

/// One instruction within its message.
struct Context<'a> {
    message: &'a Message,
    ix: &'a CompiledInstruction,
}

impl Context<'_> {
    fn program(&self) -> Address {
        self.message.account_keys[usize::from(self.ix.program_id_index)]
    }

    fn key(&self, position: usize) -> std::result::Result<Address, String> {
        self.ix
            .accounts
            .get(position)
            .map(|i| self.message.account_keys[usize::from(*i)])
            .ok_or_else(|| "not enough account keys".to_string())
    }

    fn require_signer(&self, position: usize) -> std::result::Result<Address, String> {
        let index = self
            .ix
            .accounts
            .get(position)
            .ok_or_else(|| "not enough account keys".to_string())?;
        if !self.message.is_signer(usize::from(*index)) {
            return Err("missing required signature for instruction".to_string());
        }
        self.key(position)
    }

    fn require_writable(&self, position: usize) -> std::result::Result<Address, String> {
        let index = self
            .ix
            .accounts
            .get(position)
            .ok_or_else(|| "not enough account keys".to_string())?;
        if !self.message.is_writable(usize::from(*index)) {
            return Err("instruction modified a read-only account".to_string());
        }
        self.key(position)
    }
}

type Accounts = HashMap<Address, Account>;
type Outcome = std::result::Result<(), String>;

fn debit(accounts: &mut Accounts, address: &Address, lamports: u64) -> Outcome {
    let account = accounts
        .get_mut(address)
        .ok_or_else(|| "account not found".to_string())?;
    account.lamports = account
        .lamports
        .checked_sub(lamports)
        .ok_or_else(|| "insufficient lamports".to_string())?;
    Ok(())
}

fn credit(accounts: &mut Accounts, address: &Address, lamports: u64) {
    let account = accounts.entry(*address).or_insert_with(|| Account {
        lamports: 0,
        owner: system::ID,
        data: Vec::new(),
    });
    account.lamports = account.lamports.saturating_add(lamports);
}

fn read_u64(data: &[u8], offset: usize) -> std::result::Result<u64, String> {
    data.get(offset..offset + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| "invalid instruction data".to_string())
}

fn execute(accounts: &mut Accounts, ctx: &Context<'_>) -> Outcome {
    let program = ctx.program();
    if program == system::ID {
        execute_system(accounts, ctx)
    } else if program == token::ID {
        execute_token(accounts, ctx)
    } else if program == associated_token::ID {
        execute_associated_token(accounts, ctx)
    } else {
        Err(format!("unsupported program {program}"))
    }
}

fn execute_system(accounts: &mut Accounts, ctx: &Context<'_>) -> Outcome {
    let data = &ctx.ix.data;
    let tag = data
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| "invalid instruction data".to_string())?;
    match tag {
        system::CREATE_ACCOUNT => {
            let lamports = read_u64(data, 4)?;
            let space = read_u64(data, 12)?;
            let owner = data
                .get(20..52)
                .ok_or_else(|| "invalid instruction data".to_string())
                .and_then(|b| Address::from_slice(b).map_err(|e| e.to_string()))?;
            let from = ctx.require_signer(0)?;
            let new_account = ctx.require_signer(1)?;
            ctx.require_writable(0)?;
            ctx.require_writable(1)?;
            if accounts
                .get(&new_account)
                .is_some_and(|a| a.lamports > 0 || !a.data.is_empty())
            {
                return Err(format!("account {new_account} already in use"));
            }
            debit(accounts, &from, lamports)?;
            let space = usize::try_from(space).map_err(|_| "space too large".to_string())?;
            accounts.insert(
                new_account,
                Account {
                    lamports,
                    owner,
                    data: vec![0; space],
                },
            );
            Ok(())
        }
        system::TRANSFER => {
            let lamports = read_u64(data, 4)?;
            let from = ctx.require_signer(0)?;
            let to = ctx.require_writable(1)?;
            ctx.require_writable(0)?;
            if accounts.get(&from).is_some_and(|a| !a.data.is_empty()) {
                return Err("from must not carry data".to_string());
            }
            debit(accounts, &from, lamports)?;
            credit(accounts, &to, lamports);
            Ok(())
        }
        other => Err(format!("unsupported system instruction {other}")),
    }
}

fn load_mint(accounts: &Accounts, address: &Address) -> std::result::Result<MintState, String> {
    let account = accounts
        .get(address)
        .filter(|a| a.owner == token::ID)
        .ok_or_else(|| format!("{address} is not a token mint"))?;
    let mint = MintState::unpack(&account.data).map_err(|e| e.to_string())?;
    if !mint.is_initialized {
        return Err("mint is not initialized".to_string());
    }
    Ok(mint)
}

fn load_token_account(
    accounts: &Accounts,
    address: &Address,
) -> std::result::Result<TokenAccountState, String> {
    let account = accounts
        .get(address)
        .filter(|a| a.owner == token::ID)
        .ok_or_else(|| format!("{address} is not a token account"))?;
    let state = TokenAccountState::unpack(&account.data).map_err(|e| e.to_string())?;
    if !state.is_initialized {
        return Err("token account is not initialized".to_string());
    }
    Ok(state)
}

fn store(accounts: &mut Accounts, address: &Address, data: Vec<u8>) -> Outcome {
    accounts
        .get_mut(address)
        .map(|a| a.data = data)
        .ok_or_else(|| "account not found".to_string())
}

/// Reads `COption<Pubkey>` as encoded in instruction data (one-byte tag).
fn read_option(data: &[u8], offset: usize) -> std::result::Result<Option<Address>, String> {
    match data.get(offset) {
        Some(0) => Ok(None),
        Some(1) => data
            .get(offset + 1..offset + 33)
            .ok_or_else(|| "invalid instruction data".to_string())
            .and_then(|b| Address::from_slice(b).map_err(|e| e.to_string()))
            .map(Some),
        _ => Err("invalid instruction data".to_string()),
    }
}

#[allow(clippy::too_many_lines)]
fn execute_token(accounts: &mut Accounts, ctx: &Context<'_>) -> Outcome {
    let data = &ctx.ix.data;
    match data.first().copied() {
        Some(token::INITIALIZE_MINT) => {
            let mint_address = ctx.require_writable(0)?;
            let decimals = *data.get(1).ok_or_else(|| "invalid instruction data".to_string())?;
            let authority = data
                .get(2..34)
                .ok_or_else(|| "invalid instruction data".to_string())
                .and_then(|b| Address::from_slice(b).map_err(|e| e.to_string()))?;
            let freeze_authority = read_option(data, 34)?;
            let account = accounts
                .get(&mint_address)
                .filter(|a| a.owner == token::ID && a.data.len() == token::MINT_LEN)
                .ok_or_else(|| "mint account not allocated for the token program".to_string())?;
            if account.lamports < rent_exempt_minimum(token::MINT_LEN) {
                return Err("mint account is not rent exempt".to_string());
            }
            if account.data[45] != 0 {
                return Err("mint already initialized".to_string());
            }
            let state = MintState {
                mint_authority: Some(authority),
                supply: 0,
                decimals,
                is_initialized: true,
                freeze_authority,
            };
            store(accounts, &mint_address, state.pack())
        }
        Some(token::MINT_TO) => {
            let amount = read_u64(data, 1)?;
            let mint_address = ctx.require_writable(0)?;
            let destination = ctx.require_writable(1)?;
            let signer = ctx.require_signer(2)?;
            let mut mint = load_mint(accounts, &mint_address)?;
            match mint.mint_authority {
                None => return Err("the mint has no authority; supply is fixed".to_string()),
                Some(authority) if authority != signer => {
                    return Err("owner does not match mint authority".to_string());
                }
                Some(_) => {}
            }
            let mut holder = load_token_account(accounts, &destination)?;
            if holder.mint != mint_address {
                return Err("account not associated with this mint".to_string());
            }
            mint.supply = mint
                .supply
                .checked_add(amount)
                .ok_or_else(|| "supply overflow".to_string())?;
            holder.amount += amount;
            store(accounts, &mint_address, mint.pack())?;
            store(accounts, &destination, holder.pack())
        }
        Some(token::SET_AUTHORITY) => {
            let target = ctx.require_writable(0)?;
            let signer = ctx.require_signer(1)?;
            let authority_type = data
                .get(1)
                .and_then(|t| AuthorityType::from_u8(*t))
                .ok_or_else(|| "invalid authority type".to_string())?;
            let new_authority = read_option(data, 2)?;
            let mut mint = load_mint(accounts, &target)?;
            let slot = match authority_type {
                AuthorityType::MintTokens => &mut mint.mint_authority,
                AuthorityType::FreezeAccount => &mut mint.freeze_authority,
                other => return Err(format!("authority type {other:?} not supported on a mint")),
            };
            if *slot != Some(signer) {
                return Err("owner does not match current authority".to_string());
            }
            *slot = new_authority;
            store(accounts, &target, mint.pack())
        }
        Some(token::TRANSFER) => {
            let amount = read_u64(data, 1)?;
            let source_address = ctx.require_writable(0)?;
            let destination_address = ctx.require_writable(1)?;
            let signer = ctx.require_signer(2)?;
            let mut source = load_token_account(accounts, &source_address)?;
            let mut destination = load_token_account(accounts, &destination_address)?;
            if source.owner != signer {
                return Err("owner does not match".to_string());
            }
            if source.mint != destination.mint {
                return Err("account mints do not match".to_string());
            }
            if source.amount < amount {
                return Err("insufficient funds".to_string());
            }
            if source_address == destination_address {
                return Ok(());
            }
            source.amount -= amount;
            destination.amount += amount;
            store(accounts, &source_address, source.pack())?;
            store(accounts, &destination_address, destination.pack())
        }
        Some(token::BURN) => {
            let amount = read_u64(data, 1)?;
            let holder_address = ctx.require_writable(0)?;
            let mint_address = ctx.require_writable(1)?;
            let signer = ctx.require_signer(2)?;
            let mut holder = load_token_account(accounts, &holder_address)?;
            let mut mint = load_mint(accounts, &mint_address)?;
            if holder.mint != mint_address {
                return Err("account not associated with this mint".to_string());
            }
            if holder.owner != signer {
                return Err("owner does not match".to_string());
            }
            if holder.amount < amount {
                return Err("insufficient funds".to_string());
            }
            holder.amount -= amount;
            mint.supply -= amount;
            store(accounts, &holder_address, holder.pack())?;
            store(accounts, &mint_address, mint.pack())
        }
        Some(other) => Err(format!("unsupported token instruction {other}")),
        None => Err("invalid instruction data".to_string()),
    }
}

fn execute_associated_token(accounts: &mut Accounts, ctx: &Context<'_>) -> Outcome {
    let idempotent = match ctx.ix.data.first().copied() {
        None | Some(associated_token::CREATE) => false,
        Some(associated_token::CREATE_IDEMPOTENT) => true,
        Some(other) => return Err(format!("unsupported associated token instruction {other}")),
    };
    let payer = ctx.require_signer(0)?;
    let associated = ctx.require_writable(1)?;
    let wallet = ctx.key(2)?;
    let mint = ctx.key(3)?;

    let expected = associated_token::address(&wallet, &mint).map_err(|e| e.to_string())?;
    if expected != associated {
        return Err("associated address does not match seed derivation".to_string());
    }
    load_mint(accounts, &mint)?;

    if let Some(existing) = accounts.get(&associated).filter(|a| !a.data.is_empty()) {
        if !idempotent {
            return Err(format!("account {associated} already in use"));
        }
        let state = TokenAccountState::unpack(&existing.data).map_err(|e| e.to_string())?;
        if existing.owner != token::ID || state.owner != wallet || state.mint != mint {
            return Err("existing account is not the expected associated account".to_string());
        }
        return Ok(());
    }

    let rent = rent_exempt_minimum(token::ACCOUNT_LEN);
    debit(accounts, &payer, rent)?;
    accounts.insert(
        associated,
        Account {
            lamports: rent,
            owner: token::ID,
            data: TokenAccountState::new(mint, wallet).pack(),
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Keypair;

    async fn signed(
        ledger: &SimulatedLedger,
        payer: &Keypair,
        extra: &[&Keypair],
        ixs: &[crate::instruction::Instruction],
    ) -> Vec<u8> {
        let blockhash = ledger.get_latest_blockhash().await.expect("blockhash");
        let mut tx = Transaction::build(&payer.address(), ixs, blockhash).expect("build");
        for kp in extra {
            tx.partial_sign(kp).expect("extra signer");
        }
        tx.partial_sign(payer).expect("payer signs");
        tx.serialize()
    }

    fn funded(ledger: &SimulatedLedger) -> Keypair {
        let kp = Keypair::generate();
        ledger.airdrop(&kp.address(), Amount::from_lamports(1_000_000_000));
        kp
    }

    async fn create_mint(ledger: &SimulatedLedger, payer: &Keypair) -> Keypair {
        let mint = Keypair::generate();
        let ixs = [
            system::create_account(
                &payer.address(),
                &mint.address(),
                rent_exempt_minimum(token::MINT_LEN),
                token::MINT_LEN as u64,
                &token::ID,
            ),
            token::initialize_mint(&mint.address(), 0, &payer.address(), Some(&payer.address())),
        ];
        let wire = signed(ledger, payer, &[&mint], &ixs).await;
        ledger.send_raw_transaction(&wire).await.expect("create mint");
        mint
    }

    #[tokio::test]
    async fn test_transfer_and_fee() {
        let ledger = SimulatedLedger::new();
        let payer = funded(&ledger);
        let to = Keypair::generate().address();
        let wire = signed(&ledger, &payer, &[], &[system::transfer(&payer.address(), &to, 1000)]).await;

        let sig = ledger.send_raw_transaction(&wire).await.expect("send");
        let status = ledger
            .get_signature_status(&sig)
            .await
            .expect("status")
            .expect("known");
        assert!(status.is_confirmed());
        assert_eq!(ledger.get_balance(&to).await.expect("balance").lamports(), 1000);
        assert_eq!(
            ledger.get_balance(&payer.address()).await.expect("balance").lamports(),
            1_000_000_000 - 1000 - LAMPORTS_PER_SIGNATURE
        );
        assert_eq!(ledger.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_unsigned_transaction_rejected() {
        let ledger = SimulatedLedger::new();
        let payer = funded(&ledger);
        let blockhash = ledger.get_latest_blockhash().await.expect("blockhash");
        let tx = Transaction::build(
            &payer.address(),
            &[system::transfer(&payer.address(), &payer.address(), 1)],
            blockhash,
        )
        .expect("build");
        let err = ledger
            .send_raw_transaction(&tx.serialize())
            .await
            .expect_err("unsigned");
        assert!(matches!(err, DealError::Rpc { code: SIGNATURE_FAILURE, .. }));
    }

    #[tokio::test]
    async fn test_replay_rejected() {
        let ledger = SimulatedLedger::new();
        let payer = funded(&ledger);
        let wire = signed(
            &ledger,
            &payer,
            &[],
            &[system::transfer(&payer.address(), &Keypair::generate().address(), 1)],
        )
        .await;
        ledger.send_raw_transaction(&wire).await.expect("first");
        assert!(ledger.send_raw_transaction(&wire).await.is_err());
    }

    #[tokio::test]
    async fn test_mint_issue_and_revoke() {
        let ledger = SimulatedLedger::new();
        let payer = funded(&ledger);
        let mint = create_mint(&ledger, &payer).await;
        let owner = payer.address();
        let ata = associated_token::address(&owner, &mint.address()).expect("ata");

        let ixs = [
            associated_token::create_idempotent(&owner, &owner, &mint.address()).expect("ix"),
            token::mint_to(&mint.address(), &ata, &owner, 1),
            token::set_authority(&mint.address(), &owner, AuthorityType::MintTokens, None),
        ];
        let wire = signed(&ledger, &payer, &[], &ixs).await;
        ledger.send_raw_transaction(&wire).await.expect("issue");

        let info = ledger
            .get_account_info(&mint.address())
            .await
            .expect("lookup")
            .expect("exists");
        let state = MintState::unpack(&info.data).expect("mint");
        assert!(state.is_single_edition());

        let again = [token::mint_to(&mint.address(), &ata, &owner, 1)];
        let wire = signed(&ledger, &payer, &[], &again).await;
        let err = ledger.send_raw_transaction(&wire).await.expect_err("revoked");
        assert!(err.to_string().contains("supply is fixed"));
    }

    #[tokio::test]
    async fn test_failed_instruction_rolls_back_whole_transaction() {
        let ledger = SimulatedLedger::new();
        let payer = funded(&ledger);
        let mint = create_mint(&ledger, &payer).await;
        let owner = payer.address();
        let ata = associated_token::address(&owner, &mint.address()).expect("ata");
        let before = ledger.get_balance(&owner).await.expect("balance");

        let stranger = Keypair::generate();
        let ixs = [
            associated_token::create(&owner, &owner, &mint.address()).expect("ix"),
            token::mint_to(&mint.address(), &ata, &stranger.address(), 1),
        ];
        let wire = signed(&ledger, &payer, &[&stranger], &ixs).await;
        assert!(ledger.send_raw_transaction(&wire).await.is_err());

        assert!(ledger.get_account_info(&ata).await.expect("lookup").is_none());
        assert_eq!(ledger.get_balance(&owner).await.expect("balance"), before);
    }

    #[tokio::test]
    async fn test_fail_next_sends_is_transient() {
        let ledger = SimulatedLedger::new();
        ledger.fail_next_sends(1);
        let err = ledger.send_raw_transaction(&[0]).await.expect_err("fails");
        assert!(err.is_transient());
        assert_eq!(ledger.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_withheld_confirmation() {
        let ledger = SimulatedLedger::new();
        let payer = funded(&ledger);
        ledger.withhold_confirmations(true);
        let wire = signed(
            &ledger,
            &payer,
            &[],
            &[system::transfer(&payer.address(), &Keypair::generate().address(), 1)],
        )
        .await;
        let sig = ledger.send_raw_transaction(&wire).await.expect("accepted");
        assert!(ledger.get_signature_status(&sig).await.expect("status").is_none());

        ledger.release_confirmations();
        assert!(ledger.get_signature_status(&sig).await.expect("status").is_some());
    }
}
