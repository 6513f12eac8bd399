use crate::config::ProtocolConfig;
use crate::error::{DeployError, DeployResult};
use crate::memory::{Memory, CELLS_PER_PAGE};
use crate::opcodes::{Directive, Line};
use crate::program::Program;
use crate::stack::{Stack, StackKind};
use crate::state::ContractStatus;
use signum_core::{AssetQuantity, Transaction};
use std::sync::Arc;
use tracing::warn;

/// Everything needed to load a contract. `None` fields fall back to the
/// source's `^program` directives, then to the protocol defaults.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    pub source: String,
    pub contract_id: Option<u64>,
    pub creator_id: Option<u64>,
    pub activation_amount: Option<u64>,
    pub data_pages: Option<u64>,
    pub user_stack_pages: Option<u64>,
    pub code_stack_pages: Option<u64>,
    pub initial_balance: Option<u64>,
}

impl DeployOptions {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_contract_id(mut self, id: u64) -> Self {
        self.contract_id = Some(id);
        self
    }

    pub fn with_creator_id(mut self, id: u64) -> Self {
        self.creator_id = Some(id);
        self
    }

    pub fn with_activation_amount(mut self, amount: u64) -> Self {
        self.activation_amount = Some(amount);
        self
    }

    pub fn with_initial_balance(mut self, balance: u64) -> Self {
        self.initial_balance = Some(balance);
        self
    }

    pub fn with_data_pages(mut self, pages: u64) -> Self {
        self.data_pages = Some(pages);
        self
    }

    pub fn with_stack_pages(mut self, user: u64, code: u64) -> Self {
        self.user_stack_pages = Some(user);
        self.code_stack_pages = Some(code);
        self
    }
}

/// Settings collected from `^program` lines.
#[derive(Debug, Default)]
struct ProgramSettings {
    contract_id: Option<u64>,
    creator_id: Option<u64>,
    activation_amount: Option<u64>,
    data_pages: Option<u64>,
    user_stack_pages: Option<u64>,
    code_stack_pages: Option<u64>,
}

fn parse_number(text: &str) -> Option<u64> {
    text.replace('_', "").parse().ok()
}

/// A deployed contract and its machine state.
#[derive(Debug, Clone)]
pub struct Contract {
    pub id: u64,
    pub creator: u64,
    pub program: Arc<Program>,
    pub memory: Memory,
    pub a: [u64; 4],
    pub b: [u64; 4],
    pub user_stack: Stack<u64>,
    pub code_stack: Stack<usize>,
    /// Line index of the next instruction
    pub ip: usize,
    /// Re-entry line after a finish
    pub pcs: usize,
    /// `ERR` handler line
    pub err: Option<usize>,
    pub running: bool,
    pub stopped: bool,
    pub finished: bool,
    pub frozen: bool,
    pub dead: bool,
    pub sleep_until_block: Option<u64>,
    pub exception: Option<String>,
    /// Balance at the end of the last execution slice
    pub previous_balance: u64,
    pub activation_amount: u64,
    pub creation_block: u64,
    pub data_pages: u64,
    pub user_stack_pages: u64,
    pub code_stack_pages: u64,
    /// Outbound transactions waiting for the next block forge
    pub enqueued: Vec<Transaction>,
    pub issued_assets: Vec<u64>,
    pub fees_paid: u64,
    pub steps: u64,
}

impl Contract {
    /// Parses the source and runs its directives. The returned contract
    /// carries the preferred id; the caller settles the final one.
    pub fn load(
        options: &DeployOptions,
        config: &ProtocolConfig,
        creation_block: u64,
    ) -> DeployResult<Self> {
        let program = Program::parse(&options.source);

        let mut declared: Vec<String> = Vec::new();
        let mut constants: Vec<(String, u64)> = Vec::new();
        let mut settings = ProgramSettings::default();

        for (index, line) in program.lines().iter().enumerate() {
            let Line::Directive(directive) = line else {
                continue;
            };
            let text = || program.source_line(index).unwrap_or_default().trim().to_string();
            match directive {
                Directive::Comment => {}
                Directive::Declare(name) => {
                    if !declared.contains(name) {
                        declared.push(name.clone());
                    }
                }
                Directive::Const { target, value } => {
                    if !declared.contains(target) {
                        return Err(DeployError::UndeclaredConstant {
                            line: index,
                            name: target.clone(),
                        });
                    }
                    constants.push((target.clone(), *value));
                }
                Directive::Program { key, value } => {
                    let slot = match key.as_str() {
                        "activationAmount" => &mut settings.activation_amount,
                        "creator" => &mut settings.creator_id,
                        "contract" => &mut settings.contract_id,
                        "dataPages" => &mut settings.data_pages,
                        "userStackPages" => &mut settings.user_stack_pages,
                        "codeStackPages" => &mut settings.code_stack_pages,
                        other => {
                            warn!(key = other, line = index, "ignoring ^program setting");
                            continue;
                        }
                    };
                    *slot = Some(parse_number(value).ok_or_else(|| {
                        DeployError::MalformedDirective {
                            line: index,
                            text: text(),
                        }
                    })?);
                }
                Directive::Malformed => {
                    return Err(DeployError::MalformedDirective {
                        line: index,
                        text: text(),
                    })
                }
                Directive::Unknown => {
                    return Err(DeployError::UnknownDirective {
                        line: index,
                        text: text(),
                    })
                }
            }
        }

        let first = program.first_executable().ok_or(DeployError::EmptyProgram)?;

        // Variables used without `^declare` get the next free addresses so
        // every named cell lies inside the data pages.
        for line in program.lines() {
            if let Line::Code(instruction) = line {
                for name in instruction.cell_names() {
                    if !declared.iter().any(|declared| declared == name) {
                        declared.push(name.to_string());
                    }
                }
            }
        }

        let needed_pages = (declared.len() as u64).div_ceil(CELLS_PER_PAGE as u64).max(1);
        let data_pages = options
            .data_pages
            .or(settings.data_pages)
            .unwrap_or(needed_pages);
        if data_pages < needed_pages {
            return Err(DeployError::InvalidPages(format!(
                "{} variables need {needed_pages} data pages, got {data_pages}",
                declared.len()
            )));
        }
        let user_stack_pages = options
            .user_stack_pages
            .or(settings.user_stack_pages)
            .unwrap_or(config.user_stack_pages);
        let code_stack_pages = options
            .code_stack_pages
            .or(settings.code_stack_pages)
            .unwrap_or(config.code_stack_pages);
        if user_stack_pages == 0 || code_stack_pages == 0 {
            return Err(DeployError::InvalidPages(
                "stack page counts must be non-zero".to_string(),
            ));
        }

        let mut memory = Memory::new(data_pages as usize);
        for name in &declared {
            memory.declare(name);
        }
        for (name, value) in constants {
            memory.write(&name, value);
        }

        Ok(Self {
            id: options
                .contract_id
                .or(settings.contract_id)
                .unwrap_or(config.default_contract_id),
            creator: options
                .creator_id
                .or(settings.creator_id)
                .unwrap_or(config.default_creator_id),
            program: Arc::new(program),
            memory,
            a: [0; 4],
            b: [0; 4],
            user_stack: Stack::new(StackKind::User, user_stack_pages as usize),
            code_stack: Stack::new(StackKind::Code, code_stack_pages as usize),
            ip: first,
            pcs: first,
            err: None,
            running: true,
            stopped: false,
            finished: false,
            frozen: false,
            dead: false,
            sleep_until_block: None,
            exception: None,
            previous_balance: 0,
            activation_amount: options
                .activation_amount
                .or(settings.activation_amount)
                .unwrap_or(config.default_activation_amount),
            creation_block,
            data_pages,
            user_stack_pages,
            code_stack_pages,
            enqueued: Vec::new(),
            issued_assets: Vec::new(),
            fees_paid: 0,
            steps: 0,
        })
    }

    pub fn status(&self) -> ContractStatus {
        if self.dead {
            ContractStatus::Dead
        } else if self.running {
            ContractStatus::Running
        } else if self.finished {
            ContractStatus::Finished
        } else if let Some(until_block) = self.sleep_until_block {
            ContractStatus::Sleeping { until_block }
        } else if self.frozen {
            ContractStatus::FrozenStopped
        } else {
            ContractStatus::Stopped
        }
    }

    /// Ends the current execution slice.
    pub(crate) fn halt(&mut self, balance: u64) {
        self.running = false;
        self.previous_balance = balance;
    }

    pub(crate) fn kill(&mut self, exception: String, balance: u64) {
        warn!(contract = self.id, line = self.ip, %exception, "contract died");
        self.dead = true;
        self.exception = Some(exception);
        self.halt(balance);
    }

    /// Clears every halt flag so the contract runs again.
    pub fn reactivate(&mut self) {
        self.running = true;
        self.stopped = false;
        self.frozen = false;
        self.finished = false;
        self.sleep_until_block = None;
    }

    /// Queues an outbound payment, merging it into an earlier one to the
    /// same recipient.
    pub fn enqueue(
        &mut self,
        recipient: u64,
        amount: u64,
        token: Option<AssetQuantity>,
        message: Option<[u64; 4]>,
        blockheight: u64,
    ) {
        let token = token.filter(|token| token.quantity > 0);
        if let Some(pending) = self.enqueued.iter_mut().find(|tx| tx.recipient == recipient) {
            pending.amount = pending.amount.saturating_add(amount);
            if let Some(token) = token {
                match pending.tokens.iter_mut().find(|t| t.asset == token.asset) {
                    Some(existing) => {
                        existing.quantity = existing.quantity.saturating_add(token.quantity)
                    }
                    None => pending.tokens.push(token),
                }
            }
            if let Some(page) = message {
                pending.message.extend_from_slice(&page);
            }
            return;
        }
        self.enqueued.push(Transaction::new(
            self.id,
            recipient,
            amount,
            token.into_iter().collect(),
            message.map(|page| page.to_vec()).unwrap_or_default(),
            blockheight,
        ));
    }
}
