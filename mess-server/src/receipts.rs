//! Receipt emission - the printing collaborator
//!
//! Receipts are best-effort: the financial mutation is already persisted by
//! the time a receipt is emitted, and a printer failure must never roll it
//! back. Emission therefore happens on a spawned task and failures are only
//! logged.
//!
//! The printer is injected behind [`ReceiptSink`]; nothing in the engine
//! reaches for a hardware handle directly.

use crate::config::Config;
use crate::utils::time::local_date;
use async_trait::async_trait;
use chrono_tz::Tz;
use mess_printer::{EscPosBuilder, NetworkPrinter, PrintResult, Printer};
use std::sync::Arc;

/// Meal receipt payload
#[derive(Debug, Clone)]
pub struct MealReceipt {
    pub card: String,
    pub plan_name: String,
    /// Window the meal was taken in
    pub window: String,
    /// Meals remaining after the deduction
    pub meals_left: u32,
    /// Plan end date (millis)
    pub expiry: i64,
    /// Thali variant (e.g. 80 / 100), printed when present
    pub variant: Option<u32>,
}

/// Printing collaborator interface
#[async_trait]
pub trait ReceiptSink: Send + Sync {
    async fn recharge_receipt(
        &self,
        card: &str,
        name: &str,
        amount: i64,
        balance: i64,
    ) -> PrintResult<()>;

    async fn deduction_receipt(
        &self,
        card: &str,
        name: &str,
        amount: i64,
        balance: i64,
    ) -> PrintResult<()>;

    async fn meal_receipt(&self, receipt: MealReceipt) -> PrintResult<()>;
}

/// Fire-and-forget receipt emission
///
/// Wraps an optional [`ReceiptSink`]; when no printer is configured every
/// emit is a no-op.
#[derive(Clone)]
pub struct ReceiptService {
    sink: Option<Arc<dyn ReceiptSink>>,
}

impl ReceiptService {
    pub fn new(sink: Arc<dyn ReceiptSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Receipt emission disabled (headless deployments, tests)
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Build from config: network printer when `printer_addr` is set
    pub fn from_config(config: &Config) -> Self {
        match &config.printer_addr {
            Some(addr) => match NetworkPrinter::from_addr(addr) {
                Ok(printer) => Self::new(Arc::new(EscPosReceipts::new(
                    printer,
                    config.paper_width,
                    config.timezone,
                ))),
                Err(e) => {
                    tracing::warn!(error = %e, addr = %addr, "Invalid printer address, receipts disabled");
                    Self::disabled()
                }
            },
            None => Self::disabled(),
        }
    }

    pub fn emit_recharge(&self, card: &str, name: &str, amount: i64, balance: i64) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let (card, name) = (card.to_string(), name.to_string());
        tokio::spawn(async move {
            if let Err(e) = sink.recharge_receipt(&card, &name, amount, balance).await {
                tracing::warn!(error = %e, card = %card, "Recharge receipt failed");
            }
        });
    }

    pub fn emit_deduction(&self, card: &str, name: &str, amount: i64, balance: i64) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let (card, name) = (card.to_string(), name.to_string());
        tokio::spawn(async move {
            if let Err(e) = sink.deduction_receipt(&card, &name, amount, balance).await {
                tracing::warn!(error = %e, card = %card, "Deduction receipt failed");
            }
        });
    }

    pub fn emit_meal(&self, receipt: MealReceipt) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        tokio::spawn(async move {
            let card = receipt.card.clone();
            if let Err(e) = sink.meal_receipt(receipt).await {
                tracing::warn!(error = %e, card = %card, "Meal receipt failed");
            }
        });
    }
}

impl std::fmt::Debug for ReceiptService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiptService")
            .field("enabled", &self.sink.is_some())
            .finish()
    }
}

/// ESC/POS rendering sink backed by a network printer
pub struct EscPosReceipts {
    printer: NetworkPrinter,
    width: usize,
    tz: Tz,
}

impl EscPosReceipts {
    pub fn new(printer: NetworkPrinter, width: usize, tz: Tz) -> Self {
        Self { printer, width, tz }
    }

    fn header(&self, builder: &mut EscPosBuilder) {
        let now = chrono::Utc::now().with_timezone(&self.tz);
        builder.center();
        builder.bold();
        builder.line("*** Receipt ***");
        builder.bold_off();
        builder.left();
        builder.line(&format!("Date: {}", now.format("%d/%m/%Y %H:%M")));
        builder.sep_single();
    }

    fn footer(&self, builder: &mut EscPosBuilder) {
        builder.sep_single();
        builder.center();
        builder.line("Thank You! Visit Again!");
        builder.cut_feed(4);
    }
}

/// Render the recharge/deduction receipt body
fn render_cash_body(builder: &mut EscPosBuilder, label: &str, card: &str, name: &str, amount: i64, balance: i64) {
    builder.line(&format!("RFID: {}", card));
    builder.line(&format!("NAME: {}", name));
    builder.line_lr(label, &format!("Rs {}", amount));
    builder.line_lr("Current Balance:", &format!("Rs {}", balance));
}

#[async_trait]
impl ReceiptSink for EscPosReceipts {
    async fn recharge_receipt(
        &self,
        card: &str,
        name: &str,
        amount: i64,
        balance: i64,
    ) -> PrintResult<()> {
        let mut builder = EscPosBuilder::new(self.width);
        self.header(&mut builder);
        render_cash_body(&mut builder, "Recharge Amount:", card, name, amount, balance);
        self.footer(&mut builder);
        self.printer.print(&builder.build()).await
    }

    async fn deduction_receipt(
        &self,
        card: &str,
        name: &str,
        amount: i64,
        balance: i64,
    ) -> PrintResult<()> {
        let mut builder = EscPosBuilder::new(self.width);
        self.header(&mut builder);
        render_cash_body(&mut builder, "Deduction Amount:", card, name, amount, balance);
        self.footer(&mut builder);
        self.printer.print(&builder.build()).await
    }

    async fn meal_receipt(&self, receipt: MealReceipt) -> PrintResult<()> {
        let mut builder = EscPosBuilder::new(self.width);
        self.header(&mut builder);
        builder.line(&format!("RFID: {}", receipt.card));
        builder.line(&format!("Plan: {}", receipt.plan_name));
        builder.line(&format!("Meal: {}", receipt.window));
        if let Some(variant) = receipt.variant {
            builder.line(&format!("Thali: {}", variant));
        }
        builder.line_lr("Meals Left:", &receipt.meals_left.to_string());
        builder.line_lr(
            "Plan Expiry:",
            &local_date(receipt.expiry, self.tz).format("%d/%m/%Y").to_string(),
        );
        self.footer(&mut builder);
        self.printer.print(&builder.build()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ReceiptSink for CountingSink {
        async fn recharge_receipt(&self, _: &str, _: &str, _: i64, _: i64) -> PrintResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn deduction_receipt(&self, _: &str, _: &str, _: i64, _: i64) -> PrintResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn meal_receipt(&self, _: MealReceipt) -> PrintResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(mess_printer::PrintError::Offline("test printer".into()))
        }
    }

    #[tokio::test]
    async fn test_emit_spawns_and_swallows_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = ReceiptService::new(Arc::new(CountingSink { calls: calls.clone() }));

        service.emit_recharge("RF-1", "Asha", 100, 300);
        // Meal receipt fails inside the sink; emit itself never errors
        service.emit_meal(MealReceipt {
            card: "RF-1".into(),
            plan_name: "Monthly".into(),
            window: "lunch".into(),
            meals_left: 4,
            expiry: 0,
            variant: Some(80),
        });

        // Yield so the spawned tasks run
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disabled_service_is_noop() {
        let service = ReceiptService::disabled();
        service.emit_recharge("RF-1", "Asha", 100, 300);
        service.emit_deduction("RF-1", "Asha", 50, 250);
    }
}
