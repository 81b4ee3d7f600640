fn main() -> anyhow::Result<()> {
    goldwatch_lib::run()
}
