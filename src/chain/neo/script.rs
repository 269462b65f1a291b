//! Neo script disassembly and the bridge transfer template
//!
//! Purpose:
//!     Split an invocation script into instructions and match it against the
//!     one script shape the bridge accepts: a NEP5 `transfer` call.
//!
//! ```text
//!     PUSH <amount>          (1)
//!     PUSH <target hash>     (2)
//!     PUSH <source hash>     (3)
//!     PUSH3, PACK, PUSH "transfer"
//!     APPCALL <contract>     (7)
//! ```
//!
//! This is a positional matcher for that template only, not a VM.

use super::types::UInt160;
use crate::error::DecodeReject;
use alloy::primitives::U256;

// ── Opcodes ──
pub const PUSH0: u8 = 0x00;
pub const PUSHBYTES75: u8 = 0x4b;
pub const PUSHDATA1: u8 = 0x4c;
pub const PUSHDATA2: u8 = 0x4d;
pub const PUSHDATA4: u8 = 0x4e;
pub const PUSHM1: u8 = 0x4f;
pub const PUSH1: u8 = 0x51;
pub const PUSH16: u8 = 0x60;
pub const JMP: u8 = 0x62;
pub const CALL: u8 = 0x65;
pub const APPCALL: u8 = 0x67;
pub const SYSCALL: u8 = 0x68;
pub const TAILCALL: u8 = 0x69;
pub const CALL_I: u8 = 0xe0;
pub const CALL_E: u8 = 0xe1;
pub const CALL_ED: u8 = 0xe2;
pub const CALL_ET: u8 = 0xe3;
pub const CALL_EDT: u8 = 0xe4;

/// Minimum instruction count of the transfer template
pub const TEMPLATE_LEN: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub offset: usize,
    pub opcode: u8,
    /// Pushed bytes or call operand; empty for plain opcodes
    pub data: Vec<u8>,
}

impl Instruction {
    pub fn is_appcall(&self) -> bool {
        self.opcode == APPCALL
    }
}

struct Reader<'a> {
    script: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeReject> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.script.len())
            .ok_or_else(|| {
                DecodeReject::MalformedScript(format!(
                    "operand of {} bytes at offset {} runs past end of script",
                    len, self.pos
                ))
            })?;
        let bytes = &self.script[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn length_prefix(&mut self, width: usize) -> Result<usize, DecodeReject> {
        let raw = self.take(width)?;
        let mut buf = [0u8; 8];
        buf[..width].copy_from_slice(raw);
        Ok(u64::from_le_bytes(buf) as usize)
    }

    /// Neo var-int length
    fn var_len(&mut self) -> Result<usize, DecodeReject> {
        match self.take(1)?[0] {
            0xfd => self.length_prefix(2),
            0xfe => self.length_prefix(4),
            0xff => self.length_prefix(8),
            n => Ok(n as usize),
        }
    }
}

/// Split a script into instructions. Truncated operands are an error.
pub fn disassemble(script: &[u8]) -> Result<Vec<Instruction>, DecodeReject> {
    let mut reader = Reader { script, pos: 0 };
    let mut instructions = Vec::new();

    while reader.pos < script.len() {
        let offset = reader.pos;
        let opcode = reader.take(1)?[0];
        let data = match opcode {
            PUSH0 => Vec::new(),
            0x01..=PUSHBYTES75 => reader.take(opcode as usize)?.to_vec(),
            PUSHDATA1 => {
                let len = reader.length_prefix(1)?;
                reader.take(len)?.to_vec()
            }
            PUSHDATA2 => {
                let len = reader.length_prefix(2)?;
                reader.take(len)?.to_vec()
            }
            PUSHDATA4 => {
                let len = reader.length_prefix(4)?;
                reader.take(len)?.to_vec()
            }
            PUSHM1 => vec![0xff],
            PUSH1..=PUSH16 => vec![opcode - PUSH1 + 1],
            JMP..=CALL | CALL_ED | CALL_EDT => reader.take(2)?.to_vec(),
            APPCALL | TAILCALL => reader.take(20)?.to_vec(),
            SYSCALL => {
                let len = reader.var_len()?;
                reader.take(len)?.to_vec()
            }
            CALL_I => reader.take(4)?.to_vec(),
            CALL_E | CALL_ET => reader.take(22)?.to_vec(),
            _ => Vec::new(),
        };
        instructions.push(Instruction {
            offset,
            opcode,
            data,
        });
    }
    Ok(instructions)
}

/// Fields of a matched bridge transfer script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTemplate {
    pub amount: U256,
    pub target_script_hash: UInt160,
    pub source_script_hash: UInt160,
    pub appcall_contract_hash: UInt160,
}

impl TransferTemplate {
    pub fn parse(script: &[u8]) -> Result<Self, DecodeReject> {
        Self::match_instructions(&disassemble(script)?)
    }

    pub fn match_instructions(instructions: &[Instruction]) -> Result<Self, DecodeReject> {
        if instructions.len() < TEMPLATE_LEN {
            return Err(DecodeReject::ScriptTemplate("fewer than 7 instructions"));
        }

        let call = &instructions[TEMPLATE_LEN - 1];
        if !call.is_appcall() {
            return Err(DecodeReject::ScriptTemplate("instruction 7 is not APPCALL"));
        }
        let appcall_contract_hash = UInt160::from_slice(&call.data)
            .ok_or(DecodeReject::ScriptTemplate("APPCALL operand is not a script hash"))?;

        let amount = U256::try_from_le_slice(&instructions[0].data)
            .ok_or(DecodeReject::ScriptTemplate("amount does not fit 256 bits"))?;
        let target_script_hash = UInt160::from_slice(&instructions[1].data)
            .ok_or(DecodeReject::ScriptTemplate("instruction 2 is not a script hash"))?;
        let source_script_hash = UInt160::from_slice(&instructions[2].data)
            .ok_or(DecodeReject::ScriptTemplate("instruction 3 is not a script hash"))?;

        Ok(Self {
            amount,
            target_script_hash,
            source_script_hash,
            appcall_contract_hash,
        })
    }
}

/// Build a template-shaped NEP5 transfer script
#[cfg(test)]
pub(crate) fn transfer_script(
    amount: u64,
    target: &UInt160,
    source: &UInt160,
    contract: &UInt160,
) -> Vec<u8> {
    let mut amount_bytes = amount.to_le_bytes().to_vec();
    while amount_bytes.len() > 1 && amount_bytes.last() == Some(&0) {
        amount_bytes.pop();
    }

    let mut script = vec![amount_bytes.len() as u8];
    script.extend_from_slice(&amount_bytes);
    script.push(0x14);
    script.extend_from_slice(&target.0);
    script.push(0x14);
    script.extend_from_slice(&source.0);
    script.push(0x53); // PUSH3
    script.push(0xc1); // PACK
    script.push(0x08);
    script.extend_from_slice(b"transfer");
    script.push(APPCALL);
    script.extend_from_slice(&contract.0);
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disassemble_push_forms() {
        let script = [
            PUSH0, 0x02, 0xaa, 0xbb, PUSHDATA1, 0x01, 0xcc, PUSH1 + 4, PUSHM1, 0x66,
        ];
        let instructions = disassemble(&script).unwrap();
        assert_eq!(instructions.len(), 6);
        assert_eq!(instructions[1].data, vec![0xaa, 0xbb]);
        assert_eq!(instructions[2].data, vec![0xcc]);
        assert_eq!(instructions[2].offset, 4);
        assert_eq!(instructions[3].data, vec![5]);
        assert_eq!(instructions[5].opcode, 0x66);
        assert!(instructions[5].data.is_empty());
    }

    #[test]
    fn test_disassemble_rejects_truncated_operand() {
        assert!(matches!(
            disassemble(&[0x05, 0x01, 0x02]),
            Err(DecodeReject::MalformedScript(_))
        ));
        assert!(disassemble(&[APPCALL, 0x01]).is_err());
        assert!(disassemble(&[SYSCALL, 0x04, b'N', b'e']).is_err());
    }

    #[test]
    fn test_syscall_operand() {
        let mut script = vec![SYSCALL, 0x04];
        script.extend_from_slice(b"Neo.");
        script.push(0x66);
        let instructions = disassemble(&script).unwrap();
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].data, b"Neo.".to_vec());
    }

    #[test]
    fn test_transfer_template_fields() {
        let target = UInt160([1; 20]);
        let source = UInt160([2; 20]);
        let contract = UInt160::from_display_hex("ed07cffad18f1308db51920d99a2af60ac66a7b3").unwrap();
        let script = transfer_script(150_000_000, &target, &source, &contract);

        let template = TransferTemplate::parse(&script).unwrap();
        assert_eq!(template.amount, U256::from(150_000_000u64));
        assert_eq!(template.target_script_hash, target);
        assert_eq!(template.source_script_hash, source);
        assert_eq!(template.appcall_contract_hash, contract);
    }

    #[test]
    fn test_template_needs_appcall_at_seven() {
        let script = [PUSH1, PUSH1, PUSH1, PUSH1, PUSH1, PUSH1, PUSH1];
        assert_eq!(
            TransferTemplate::parse(&script),
            Err(DecodeReject::ScriptTemplate("instruction 7 is not APPCALL"))
        );
        assert_eq!(
            TransferTemplate::parse(&[PUSH1, PUSH1]),
            Err(DecodeReject::ScriptTemplate("fewer than 7 instructions"))
        );
    }

    #[test]
    fn test_template_needs_script_hashes() {
        // amount, then a 1-byte push where the target hash belongs
        let mut script = vec![0x01, 0x05, 0x01, 0x09, 0x14];
        script.extend_from_slice(&[3; 20]);
        script.extend_from_slice(&[0x53, 0xc1, 0x08]);
        script.extend_from_slice(b"transfer");
        script.push(APPCALL);
        script.extend_from_slice(&[4; 20]);
        assert_eq!(
            TransferTemplate::parse(&script),
            Err(DecodeReject::ScriptTemplate("instruction 2 is not a script hash"))
        );
    }
}
