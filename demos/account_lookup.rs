use corebank_transport::{CallContext, GatewayClient, Operation};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = GatewayClient::from_env()?;

    let envelope = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <AccountLookup><AccountNumber>0011223344</AccountNumber></AccountLookup>
  </soap:Body>
</soap:Envelope>"#;

    let ctx = CallContext::new().with_timeout(Duration::from_secs(90));
    let response = client
        .call_in(&ctx, Operation::AccountLookup, envelope, None)
        .await?;

    println!(
        "HTTP {} after {} attempt(s)",
        response.status(),
        response.attempts()
    );
    println!("{}", response.text());

    Ok(())
}
