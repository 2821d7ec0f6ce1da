fn main() -> miette::Result<()> {
    jokoshare::start_jokoshare()
}
