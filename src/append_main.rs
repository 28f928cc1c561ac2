// Fast path for shell hooks: `wen-append <commandline>` records one history
// line for the parent shell without going through argument parsing.

fn main() -> anyhow::Result<()> {
    wen::append_main()
}
