pub fn handle() -> anyhow::Result<()> {
    println!("awsflow {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
