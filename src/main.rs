fn main() -> anyhow::Result<()> {
    mailroom_lib::run()
}
