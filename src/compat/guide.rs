//! Static migration guides, one markdown page per topic.

use crate::error::{MigrateError, Result};

pub const TOPICS: &[&str] = &[
    "print",
    "unicode",
    "dict_methods",
    "exceptions",
    "division",
    "imports",
];

/// Markdown guide for `topic`. Lookup ignores case and surrounding space.
pub fn guide(topic: &str) -> Result<&'static str> {
    let key = topic.trim().to_lowercase();
    let text = match key.as_str() {
        "print" => PRINT,
        "unicode" => UNICODE,
        "dict_methods" | "dict-methods" | "dict" => DICT_METHODS,
        "exceptions" => EXCEPTIONS,
        "division" => DIVISION,
        "imports" => IMPORTS,
        _ => {
            return Err(MigrateError::NotFound {
                path: format!("guide:{key} (available: {})", TOPICS.join(", ")).into(),
            })
        }
    };
    Ok(text)
}

pub const QUICK_REFERENCE_URI: &str = "guide://py2to3-quickref";

pub const QUICK_REFERENCE: &str = r#"# Python 2 to 3 Quick Reference

## Most Common Changes

| Python 2 | Python 3 |
|----------|----------|
| `print "x"` | `print("x")` |
| `raw_input()` | `input()` |
| `xrange()` | `range()` |
| `d.iteritems()` | `d.items()` |
| `d.has_key(k)` | `k in d` |
| `unicode()` | `str()` |
| `except E, e:` | `except E as e:` |
| `a <> b` | `a != b` |
| `0755` | `0o755` |

## Future Imports for Compatibility

```python
from __future__ import print_function
from __future__ import division
from __future__ import unicode_literals
from __future__ import absolute_import
```

## Needs Human Review

Text matching cannot prove these behave the same after conversion:
integer division, str/bytes boundaries (files, sockets, subprocess output),
pickled data, and dynamically executed code.
"#;

const PRINT: &str = r#"## Print Statement to Print Function

Python 2:
```python
print "Hello"
print x, y
print x,
print >>sys.stderr, "error"
```

Python 3:
```python
print("Hello")
print(x, y)
print(x, end=' ')
print("error", file=sys.stderr)
```

For compatibility, add at the top of the file:
```python
from __future__ import print_function
```"#;

const UNICODE: &str = r#"## Unicode Changes

Python 2:
```python
u"unicode string"
"byte string"
unicode(x)
isinstance(s, basestring)
```

Python 3:
```python
"unicode string"  # all strings are unicode
b"byte string"    # explicit bytes
str(x)
isinstance(s, str)
```

For compatibility:
```python
from __future__ import unicode_literals
```"#;

const DICT_METHODS: &str = r#"## Dictionary Methods

Python 2:
```python
d.iteritems()
d.iterkeys()
d.itervalues()
d.has_key(k)
```

Python 3:
```python
d.items()   # returns a view, not a list
d.keys()
d.values()
k in d
```

If you need a list:
```python
list(d.items())
```"#;

const EXCEPTIONS: &str = r#"## Exception Handling

Python 2:
```python
except Exception, e:
    pass

raise ValueError, "message"
```

Python 3:
```python
except Exception as e:
    pass

raise ValueError("message")
```"#;

const DIVISION: &str = r#"## Division

Python 2:
```python
5 / 2  # = 2 (integer division)
```

Python 3:
```python
5 / 2   # = 2.5 (true division)
5 // 2  # = 2 (floor division)
```

Converters leave `/` alone, so every division of integers needs review.

For compatibility:
```python
from __future__ import division
```"#;

const IMPORTS: &str = r#"## Changed Imports

Python 2 to Python 3:
- `ConfigParser` to `configparser`
- `Queue` to `queue`
- `cPickle` to `pickle`
- `urllib2` to `urllib.request` and `urllib.error`
- `urlparse` to `urllib.parse`
- `httplib` to `http.client`
- `StringIO`, `cStringIO` to `io.StringIO`
- `Tkinter` to `tkinter`
- `cookielib` to `http.cookiejar`
- `commands` to `subprocess`

Use `six` or `future` for code that must run on both.
"#;
