fn main() -> anyhow::Result<()> {
    chat_forensics::run()
}
