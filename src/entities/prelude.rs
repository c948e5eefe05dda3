pub use super::deposit_intents::Entity as DepositIntents;
pub use super::deposit_transactions::Entity as DepositTransactions;
