// src/contracts.rs
//! ABI bindings for the Kernel smart account, its factory and the v0.6 entry point.
#![allow(clippy::too_many_arguments)]

use ethers::contract::abigen;

abigen!(
    Kernel,
    r#"[
        function initialize(address defaultValidator, bytes data) external payable
        function execute(address to, uint256 value, bytes data, uint8 operation) external payable
        function executeBatch(address[] to, uint256[] value, bytes[] data, uint8 operation) external payable
    ]"#;

    KernelFactory,
    r#"[
        function createAccount(address implementation, bytes data, uint256 index) external payable returns (address)
        function getAccountAddress(bytes data, uint256 index) external view returns (address)
    ]"#;

    EntryPoint,
    r#"[
        struct UserOperation { address sender; uint256 nonce; bytes initCode; bytes callData; uint256 callGasLimit; uint256 verificationGasLimit; uint256 preVerificationGas; uint256 maxFeePerGas; uint256 maxPriorityFeePerGas; bytes paymasterAndData; bytes signature; }
        function getUserOpHash(UserOperation userOp) external view returns (bytes32)
        function getNonce(address sender, uint192 key) external view returns (uint256)
        function balanceOf(address account) external view returns (uint256)
        function depositTo(address account) external payable
        function withdrawTo(address withdrawAddress, uint256 withdrawAmount) external
    ]"#;
);

impl From<&crate::types::UserOperation> for UserOperation {
    fn from(op: &crate::types::UserOperation) -> Self {
        Self {
            sender: op.sender,
            nonce: op.nonce,
            init_code: op.init_code.clone(),
            call_data: op.call_data.clone(),
            call_gas_limit: op.call_gas_limit,
            verification_gas_limit: op.verification_gas_limit,
            pre_verification_gas: op.pre_verification_gas,
            max_fee_per_gas: op.max_fee_per_gas,
            max_priority_fee_per_gas: op.max_priority_fee_per_gas,
            paymaster_and_data: op.paymaster_and_data.clone(),
            signature: op.signature.clone(),
        }
    }
}
