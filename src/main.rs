fn main() -> anyhow::Result<()> {
    banana_grove::flow::run()
}
