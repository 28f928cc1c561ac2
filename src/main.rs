fn main() -> anyhow::Result<()> {
    wen::main_inner()
}
